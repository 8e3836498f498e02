//! Memory event store error types

use thiserror::Error;

use crate::data::filters::FilterError;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fixture {path}: {error}")]
    Fixture { path: String, error: String },

    #[error("Invalid query: {0}")]
    Query(#[from] FilterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_error_display() {
        let err = MemoryError::Fixture {
            path: "events.json".to_string(),
            error: "expected value at line 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid fixture events.json: expected value at line 1"
        );
    }
}
