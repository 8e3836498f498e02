//! PostgreSQL error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = PostgresError::Config("PostgreSQL URL is required".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: PostgreSQL URL is required"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = PostgresError::NotFound {
            entity: "session",
            id: "s-1".to_string(),
        };
        assert_eq!(err.to_string(), "session not found: s-1");
    }
}
