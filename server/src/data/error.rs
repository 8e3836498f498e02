//! Unified error type for data layer
//!
//! This module provides a unified error type that can represent errors from
//! all store backends (memory, ClickHouse, SQLite, PostgreSQL).

use thiserror::Error;

use crate::data::filters::FilterError;

/// Unified error type for data layer operations
///
/// This error type wraps backend-specific errors while preserving context
/// about which backend generated the error.
#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error (metadata store)
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// PostgreSQL database error (metadata store)
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// ClickHouse database error (event store)
    #[error("ClickHouse error: {0}")]
    Clickhouse(#[from] clickhouse::error::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    /// The targeted row does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Filter or ordering could not be translated
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] FilterError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fixture or payload decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Query timeout
    #[error("Query timeout after {timeout_secs}s on {backend}")]
    Timeout {
        backend: &'static str,
        timeout_secs: u64,
    },

    /// Backend not available
    #[error("Backend {backend} is not available: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },
}

impl DataError {
    /// Create a migration failed error
    pub fn migration_failed(backend: &'static str, version: i32, name: &str, error: &str) -> Self {
        Self::MigrationFailed {
            backend,
            version,
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(backend: &'static str, timeout_secs: u64) -> Self {
        Self::Timeout {
            backend,
            timeout_secs,
        }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::BackendUnavailable { .. } => true,
            Self::Sqlite(e) | Self::Postgres(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            Self::Clickhouse(e) => {
                let msg = e.to_string();
                msg.contains("connection") || msg.contains("timeout") || msg.contains("network")
            }
            _ => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
            Self::Clickhouse(_) => "clickhouse",
            Self::MigrationFailed { backend, .. } => backend,
            Self::Timeout { backend, .. } => backend,
            Self::BackendUnavailable { backend, .. } => backend,
            Self::NotFound { .. }
            | Self::InvalidQuery(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_) => "unknown",
        }
    }
}

/// Convert from the SqliteError type
impl From<crate::data::sqlite::SqliteError> for DataError {
    fn from(e: crate::data::sqlite::SqliteError) -> Self {
        match e {
            crate::data::sqlite::SqliteError::Database(e) => Self::Sqlite(e),
            crate::data::sqlite::SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "sqlite",
                version,
                name,
                error,
            },
            crate::data::sqlite::SqliteError::Io(e) => Self::Io(e),
            crate::data::sqlite::SqliteError::NotFound { entity, id } => {
                Self::NotFound { entity, id }
            }
        }
    }
}

/// Convert from the PostgresError type
impl From<crate::data::postgres::PostgresError> for DataError {
    fn from(e: crate::data::postgres::PostgresError) -> Self {
        match e {
            crate::data::postgres::PostgresError::Database(e) => Self::Postgres(e),
            crate::data::postgres::PostgresError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "postgres",
                version,
                name,
                error,
            },
            crate::data::postgres::PostgresError::Config(msg) => Self::Config(msg),
            crate::data::postgres::PostgresError::NotFound { entity, id } => {
                Self::NotFound { entity, id }
            }
        }
    }
}

/// Convert from the ClickhouseError type
impl From<crate::data::clickhouse::ClickhouseError> for DataError {
    fn from(e: crate::data::clickhouse::ClickhouseError) -> Self {
        match e {
            crate::data::clickhouse::ClickhouseError::Database(e) => Self::Clickhouse(e),
            crate::data::clickhouse::ClickhouseError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "clickhouse",
                version,
                name,
                error,
            },
            crate::data::clickhouse::ClickhouseError::Connection(msg) => {
                Self::BackendUnavailable {
                    backend: "clickhouse",
                    reason: msg,
                }
            }
            crate::data::clickhouse::ClickhouseError::InvalidValue { column, value } => {
                Self::Config(format!("unreadable {} value from clickhouse: {}", column, value))
            }
            crate::data::clickhouse::ClickhouseError::Query(e) => Self::InvalidQuery(e),
        }
    }
}

/// Convert from the MemoryError type
impl From<crate::data::memory::MemoryError> for DataError {
    fn from(e: crate::data::memory::MemoryError) -> Self {
        match e {
            crate::data::memory::MemoryError::Io(e) => Self::Io(e),
            crate::data::memory::MemoryError::Fixture { path, error } => {
                Self::Config(format!("invalid memory fixture {}: {}", path, error))
            }
            crate::data::memory::MemoryError::Query(e) => Self::InvalidQuery(e),
        }
    }
}
