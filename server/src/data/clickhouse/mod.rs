//! ClickHouse event store
//!
//! Read side of the append-only trace, observation and score tables.
//! Uses async HTTP/S connections with LZ4 compression and keep-alive.

pub mod error;
pub mod query;
pub mod repositories;
mod repository_impl;
pub mod schema;

pub use error::ClickhouseError;

use clickhouse::Client;

use crate::core::config::ClickhouseConfig;

/// ClickHouse event store service
///
/// The clickhouse crate's Client internally uses hyper with connection
/// pooling via HTTP keep-alive, so one client is shared by all queries.
pub struct ClickhouseService {
    client: Client,
}

impl ClickhouseService {
    /// Connect, apply the query timeout and run schema migrations
    pub async fn init(config: &ClickhouseConfig) -> Result<Self, ClickhouseError> {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.user {
            client = client.with_user(user);
        }
        if let Some(ref password) = config.password {
            client = client.with_password(password);
        }

        if config.compression {
            client = client.with_compression(clickhouse::Compression::Lz4);
        }

        if config.timeout_secs > 0 {
            client = client.with_option("max_execution_time", config.timeout_secs.to_string());
        }

        let service = Self { client };
        service.run_migrations().await?;

        tracing::debug!(
            url = %config.url,
            database = %config.database,
            compression = %config.compression,
            timeout_secs = config.timeout_secs,
            "ClickhouseService initialized"
        );

        Ok(service)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Health check - verify connection to ClickHouse
    pub async fn health_check(&self) -> Result<(), ClickhouseError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(ClickhouseError::from)
    }

    async fn run_migrations(&self) -> Result<(), ClickhouseError> {
        let table_exists: bool = self
            .client
            .query(
                "SELECT count() > 0 FROM system.tables WHERE database = currentDatabase() AND name = 'schema_version'",
            )
            .fetch_one()
            .await
            .map_err(|e| ClickhouseError::Connection(format!(
                "Failed to check schema_version table: {}. Verify ClickHouse is running and accessible.",
                e
            )))?;

        if !table_exists {
            tracing::debug!(
                "Applying initial ClickHouse schema v{}",
                schema::SCHEMA_VERSION
            );
            return self.apply_initial_schema().await;
        }

        let current_version: Option<i32> = self
            .client
            .query("SELECT version FROM schema_version FINAL WHERE id = 1")
            .fetch_optional()
            .await?;

        match current_version {
            None => {
                tracing::debug!(
                    "Applying initial ClickHouse schema v{}",
                    schema::SCHEMA_VERSION
                );
                self.apply_initial_schema().await?;
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(ClickhouseError::MigrationFailed {
                    version: v,
                    name: "version_check".to_string(),
                    error: format!(
                        "Database schema version {} is newer than application version {}. Upgrade the application.",
                        v,
                        schema::SCHEMA_VERSION
                    ),
                });
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                return Err(ClickhouseError::MigrationFailed {
                    version: v + 1,
                    name: "unknown".to_string(),
                    error: format!("No migration defined for version {}", v + 1),
                });
            }
            _ => {
                tracing::debug!(
                    "ClickHouse schema is up to date (v{})",
                    schema::SCHEMA_VERSION
                );
            }
        }

        Ok(())
    }

    async fn apply_initial_schema(&self) -> Result<(), ClickhouseError> {
        for statement in schema::generate_schema() {
            self.client
                .query(statement)
                .execute()
                .await
                .map_err(|e| ClickhouseError::MigrationFailed {
                    version: schema::SCHEMA_VERSION,
                    name: "initial_schema".to_string(),
                    error: e.to_string(),
                })?;
        }

        let now = chrono::Utc::now().timestamp();
        self.client
            .query(
                "INSERT INTO schema_version (id, version, applied_at, description) \
                 VALUES (1, {version:Int32}, {appliedAt:Int64}, 'Initial schema')",
            )
            .param("version", schema::SCHEMA_VERSION)
            .param("appliedAt", now)
            .execute()
            .await?;

        tracing::debug!(
            version = schema::SCHEMA_VERSION,
            "ClickHouse schema applied successfully"
        );
        Ok(())
    }

    /// Close the connection gracefully (no-op for ClickHouse HTTP client)
    pub async fn close(&self) {
        tracing::debug!("ClickHouse connection closed");
    }
}
