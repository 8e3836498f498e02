//! Data storage layer
//!
//! Provides the two stores the session domain reads from:
//! - `memory` / `clickhouse` - Event store holding append-only trace,
//!   observation and score versions
//! - `sqlite` / `postgres` - Metadata store for session flags and accounts
//! - `filters` - Typed filters and the logical column table
//! - `types` - Shared data types across all backends
//! - `traits` - Repository traits for multi-backend support
//! - `error` - Unified error type for all backends
//!
//! ## Backend Support
//!
//! The data layer supports multiple backends through traits:
//! - `EventStore` - Implemented by the memory store and ClickHouse
//! - `MetadataRepository` - Implemented by SQLite and PostgreSQL

pub mod clickhouse;
pub mod error;
pub mod filters;
pub mod memory;
pub mod postgres;
pub mod sqlite;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;
pub mod types;

// Re-export backend-specific services
pub use clickhouse::ClickhouseService;
pub use memory::MemoryEventStore;
pub use postgres::PostgresService;
pub use sqlite::SqliteService;

// Re-export unified error type
pub use error::DataError;

// Re-export repository traits
pub use traits::{EventStore, MetadataRepository};

use std::sync::Arc;

use crate::core::config::{AnalyticsBackend, AppConfig, DatabaseConfig, TransactionalBackend};
use crate::core::storage::AppStorage;

/// Transactional database service enum
///
/// Wraps the underlying backend-specific metadata store (SQLite or PostgreSQL).
/// Services are stored as Arc to enable safe extraction.
pub enum TransactionalService {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend (for shared deployments)
    Postgres(Arc<PostgresService>),
}

impl TransactionalService {
    /// Initialize the metadata store based on configuration
    ///
    /// For SQLite, uses the configured path or the data directory.
    /// For PostgreSQL, requires a PostgresConfig.
    pub async fn init(config: &AppConfig, storage: &AppStorage) -> Result<Self, DataError> {
        match config.database.transactional {
            TransactionalBackend::Sqlite => {
                let path = storage.sqlite_db_path(config);
                let service = SqliteService::init(&path).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            TransactionalBackend::Postgres => {
                let pg = config.database.postgres.as_ref().ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(pg).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Postgres(p) => p.close().await,
        }
    }

    /// Get the backend type
    pub fn backend(&self) -> TransactionalBackend {
        match self {
            Self::Sqlite(_) => TransactionalBackend::Sqlite,
            Self::Postgres(_) => TransactionalBackend::Postgres,
        }
    }

    /// Get the repository trait object for metadata operations
    pub fn repository(&self) -> Arc<dyn MetadataRepository> {
        match self {
            Self::Sqlite(s) => Arc::new(Arc::clone(s)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }
}

/// Analytics (event store) service enum
///
/// Wraps the underlying event store (in-memory or ClickHouse).
pub enum AnalyticsService {
    /// In-process store (default, optional fixture)
    Memory(Arc<MemoryEventStore>),
    /// ClickHouse backend (for production volumes)
    Clickhouse(Arc<ClickhouseService>),
}

impl AnalyticsService {
    /// Initialize the event store based on configuration
    pub async fn init(config: &DatabaseConfig) -> Result<Self, DataError> {
        match config.analytics {
            AnalyticsBackend::Memory => {
                let store = MemoryEventStore::init(config.memory_fixture.as_deref()).await?;
                Ok(Self::Memory(Arc::new(store)))
            }
            AnalyticsBackend::Clickhouse => {
                let ch = config.clickhouse.as_ref().ok_or_else(|| {
                    DataError::Config("ClickHouse configuration required".to_string())
                })?;
                let service = ClickhouseService::init(ch).await?;
                Ok(Self::Clickhouse(Arc::new(service)))
            }
        }
    }

    /// Close the connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Memory(m) => m.close().await,
            Self::Clickhouse(c) => c.close().await,
        }
    }

    /// Get the backend type
    pub fn backend(&self) -> AnalyticsBackend {
        match self {
            Self::Memory(_) => AnalyticsBackend::Memory,
            Self::Clickhouse(_) => AnalyticsBackend::Clickhouse,
        }
    }

    /// Get the event store trait object
    pub fn repository(&self) -> Arc<dyn EventStore> {
        match self {
            Self::Memory(m) => Arc::new(Arc::clone(m)),
            Self::Clickhouse(c) => Arc::new(Arc::clone(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cli::CliConfig;
    use crate::data::types::SessionQuery;

    #[tokio::test]
    async fn test_analytics_service_defaults_to_memory() {
        let config = AppConfig::load_defaults_for_test(&CliConfig::default());
        let service = AnalyticsService::init(&config.database).await.unwrap();
        assert_eq!(service.backend(), AnalyticsBackend::Memory);
        let store = service.repository();
        assert_eq!(store.count_sessions(&SessionQuery::new("p")).await.unwrap(), 0);
        service.close().await;
    }

    #[tokio::test]
    async fn test_transactional_service_sqlite_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_defaults_for_test(&CliConfig::default());
        let storage = AppStorage::init_for_test(dir.path().to_path_buf());
        let service = TransactionalService::init(&config, &storage).await.unwrap();
        assert_eq!(service.backend(), TransactionalBackend::Sqlite);
        assert!(
            service
                .repository()
                .get_session("s", "p")
                .await
                .unwrap()
                .is_none()
        );
        service.close().await;
    }
}
