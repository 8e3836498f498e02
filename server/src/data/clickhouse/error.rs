//! ClickHouse error types

use thiserror::Error;

use crate::data::filters::FilterError;

#[derive(Error, Debug)]
pub enum ClickhouseError {
    #[error("Database error: {0}")]
    Database(#[from] clickhouse::error::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("Invalid query: {0}")]
    Query(#[from] FilterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = ClickhouseError::MigrationFailed {
            version: 2,
            name: "add_scores_index".to_string(),
            error: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_scores_index) failed: syntax error"
        );
    }

    #[test]
    fn test_connection_error_display() {
        let err = ClickhouseError::Connection("connection refused".to_string());
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ClickhouseError::InvalidValue {
            column: "total_cost",
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value in column total_cost: abc");
    }

    #[test]
    fn test_filter_error_from() {
        let err: ClickhouseError = FilterError::UnknownColumn("x".to_string()).into();
        assert!(matches!(err, ClickhouseError::Query(_)));
    }
}
