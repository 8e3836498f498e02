use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CLICKHOUSE_DEFAULT_DATABASE, CLICKHOUSE_DEFAULT_TIMEOUT_SECS,
    CONFIG_FILE_NAME, DEFAULT_METRICS_SCORE_LIMIT, DEFAULT_SCORE_CHUNK_SIZE,
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Transactional Backend Enum (SQLite or PostgreSQL)
// =============================================================================

/// Transactional database backend for session metadata and accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionalBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for TransactionalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionalBackend::Sqlite => write!(f, "sqlite"),
            TransactionalBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// Analytics Backend Enum (Memory or ClickHouse)
// =============================================================================

/// Event store backend holding raw trace, observation and score events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsBackend {
    #[default]
    Memory,
    Clickhouse,
}

impl fmt::Display for AnalyticsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsBackend::Memory => write!(f, "memory"),
            AnalyticsBackend::Clickhouse => write!(f, "clickhouse"),
        }
    }
}

// =============================================================================
// Listing Mode Enum
// =============================================================================

/// How conversation listings pick the users whose sessions are visible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// Only sessions of known accounts and test users
    #[default]
    AllowList,
    /// Every session with at least one member (development)
    Unrestricted,
}

impl fmt::Display for ListingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingMode::AllowList => write!(f, "allow_list"),
            ListingMode::Unrestricted => write!(f, "unrestricted"),
        }
    }
}

// =============================================================================
// File Config (JSON)
// =============================================================================

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use SESSIONSCOPE_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// ClickHouse configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClickhouseFileConfig {
    /// ClickHouse connection URL (or use SESSIONSCOPE_CLICKHOUSE_URL env var)
    pub url: Option<String>,
    /// Database name (default: "sessionscope")
    pub database: Option<String>,
    /// Username for authentication
    pub user: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Query timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Enable LZ4 compression (default: true)
    pub compression: Option<bool>,
}

/// SQLite configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SqliteFileConfig {
    /// Database file (default: <data dir>/sqlite/sessionscope.db)
    pub path: Option<String>,
}

/// Memory event store configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemoryFileConfig {
    /// JSON fixture with raw traces, observations and scores
    pub fixture: Option<String>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Transactional backend: sqlite (default) or postgres
    pub transactional: Option<TransactionalBackend>,
    /// Analytics backend: memory (default) or clickhouse
    pub analytics: Option<AnalyticsBackend>,
    pub postgres: Option<PostgresFileConfig>,
    pub clickhouse: Option<ClickhouseFileConfig>,
    pub sqlite: Option<SqliteFileConfig>,
    pub memory: Option<MemoryFileConfig>,
}

/// Sessions configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SessionsFileConfig {
    pub listing_mode: Option<ListingMode>,
    pub score_chunk_size: Option<usize>,
    pub metrics_score_limit: Option<u32>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub sessions: Option<SessionsFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(database) = other.database {
            let current = self
                .database
                .get_or_insert_with(DatabaseFileConfig::default);
            if database.transactional.is_some() {
                tracing::trace!(transactional = ?database.transactional, "Merging database.transactional");
                current.transactional = database.transactional;
            }
            if database.analytics.is_some() {
                tracing::trace!(analytics = ?database.analytics, "Merging database.analytics");
                current.analytics = database.analytics;
            }
            if let Some(pg) = database.postgres {
                let cur = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                if pg.url.is_some() {
                    cur.url = pg.url;
                }
                if pg.max_connections.is_some() {
                    cur.max_connections = pg.max_connections;
                }
                if pg.min_connections.is_some() {
                    cur.min_connections = pg.min_connections;
                }
                if pg.acquire_timeout_secs.is_some() {
                    cur.acquire_timeout_secs = pg.acquire_timeout_secs;
                }
                if pg.idle_timeout_secs.is_some() {
                    cur.idle_timeout_secs = pg.idle_timeout_secs;
                }
                if pg.max_lifetime_secs.is_some() {
                    cur.max_lifetime_secs = pg.max_lifetime_secs;
                }
                if pg.statement_timeout_secs.is_some() {
                    cur.statement_timeout_secs = pg.statement_timeout_secs;
                }
            }
            if let Some(ch) = database.clickhouse {
                let cur = current
                    .clickhouse
                    .get_or_insert_with(ClickhouseFileConfig::default);
                if ch.url.is_some() {
                    cur.url = ch.url;
                }
                if ch.database.is_some() {
                    cur.database = ch.database;
                }
                if ch.user.is_some() {
                    cur.user = ch.user;
                }
                if ch.password.is_some() {
                    cur.password = ch.password;
                }
                if ch.timeout_secs.is_some() {
                    cur.timeout_secs = ch.timeout_secs;
                }
                if ch.compression.is_some() {
                    cur.compression = ch.compression;
                }
            }
            if let Some(sqlite) = database.sqlite
                && sqlite.path.is_some()
            {
                current
                    .sqlite
                    .get_or_insert_with(SqliteFileConfig::default)
                    .path = sqlite.path;
            }
            if let Some(memory) = database.memory
                && memory.fixture.is_some()
            {
                current
                    .memory
                    .get_or_insert_with(MemoryFileConfig::default)
                    .fixture = memory.fixture;
            }
        }

        if let Some(sessions) = other.sessions {
            let current = self
                .sessions
                .get_or_insert_with(SessionsFileConfig::default);
            if sessions.listing_mode.is_some() {
                tracing::trace!(listing_mode = ?sessions.listing_mode, "Merging sessions.listing_mode");
                current.listing_mode = sessions.listing_mode;
            }
            if sessions.score_chunk_size.is_some() {
                current.score_chunk_size = sessions.score_chunk_size;
            }
            if sessions.metrics_score_limit.is_some() {
                current.metrics_score_limit = sessions.metrics_score_limit;
            }
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// ClickHouse configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct ClickhouseConfig {
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// Enable LZ4 compression for requests/responses
    pub compression: bool,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub transactional: TransactionalBackend,
    pub analytics: AnalyticsBackend,
    /// Only populated if transactional = postgres
    pub postgres: Option<PostgresConfig>,
    /// Only populated if analytics = clickhouse
    pub clickhouse: Option<ClickhouseConfig>,
    /// Explicit SQLite file; None uses the data directory
    pub sqlite_path: Option<PathBuf>,
    /// Fixture preloaded into the memory event store
    pub memory_fixture: Option<PathBuf>,
}

/// Sessions configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct SessionsConfig {
    pub listing_mode: ListingMode,
    pub score_chunk_size: usize,
    pub metrics_score_limit: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            listing_mode: ListingMode::default(),
            score_chunk_size: DEFAULT_SCORE_CHUNK_SIZE,
            metrics_score_limit: DEFAULT_METRICS_SCORE_LIMIT,
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sessions: SessionsConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.sessionscope/sessionscope.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config);
        config.validate()?;

        tracing::debug!(
            transactional_backend = %config.database.transactional,
            analytics_backend = %config.database.analytics,
            listing_mode = %config.sessions.listing_mode,
            score_chunk_size = config.sessions.score_chunk_size,
            metrics_score_limit = config.sessions.metrics_score_limit,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer defaults, merged file config and CLI/env overrides
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_database = file_config.database.unwrap_or_default();
        let file_sessions = file_config.sessions.unwrap_or_default();

        let transactional_backend = cli
            .transactional_backend
            .or(file_database.transactional)
            .unwrap_or_default();
        let analytics_backend = cli
            .analytics_backend
            .or(file_database.analytics)
            .unwrap_or_default();

        let postgres_config = if transactional_backend == TransactionalBackend::Postgres {
            let file_pg = file_database.postgres.unwrap_or_default();
            Some(PostgresConfig {
                url: cli.postgres_url.clone().or(file_pg.url).unwrap_or_default(),
                max_connections: file_pg
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_pg
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_pg
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_pg
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_pg
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_pg
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            })
        } else {
            None
        };

        let clickhouse_config = if analytics_backend == AnalyticsBackend::Clickhouse {
            let file_ch = file_database.clickhouse.unwrap_or_default();
            Some(ClickhouseConfig {
                url: cli
                    .clickhouse_url
                    .clone()
                    .or(file_ch.url)
                    .unwrap_or_default(),
                database: file_ch
                    .database
                    .unwrap_or_else(|| CLICKHOUSE_DEFAULT_DATABASE.to_string()),
                user: file_ch.user,
                password: file_ch.password,
                timeout_secs: file_ch
                    .timeout_secs
                    .unwrap_or(CLICKHOUSE_DEFAULT_TIMEOUT_SECS),
                compression: file_ch.compression.unwrap_or(true),
            })
        } else {
            None
        };

        let sqlite_path = cli
            .sqlite_path
            .clone()
            .or_else(|| {
                file_database
                    .sqlite
                    .and_then(|s| s.path)
                    .map(|p| expand_path(&p))
            });
        let memory_fixture = cli.memory_fixture.clone().or_else(|| {
            file_database
                .memory
                .and_then(|m| m.fixture)
                .map(|p| expand_path(&p))
        });

        let sessions = SessionsConfig {
            listing_mode: cli
                .listing_mode
                .or(file_sessions.listing_mode)
                .unwrap_or_default(),
            score_chunk_size: file_sessions
                .score_chunk_size
                .unwrap_or(DEFAULT_SCORE_CHUNK_SIZE),
            metrics_score_limit: file_sessions
                .metrics_score_limit
                .unwrap_or(DEFAULT_METRICS_SCORE_LIMIT),
        };

        Self {
            database: DatabaseConfig {
                transactional: transactional_backend,
                analytics: analytics_backend,
                postgres: postgres_config,
                clickhouse: clickhouse_config,
                sqlite_path,
                memory_fixture,
            },
            sessions,
        }
    }

    /// Defaults layered with CLI values only, no config files
    #[cfg(test)]
    pub fn load_defaults_for_test(cli: &CliConfig) -> Self {
        Self::from_layers(cli, FileConfig::default())
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.sessions.score_chunk_size == 0 {
            anyhow::bail!("Configuration error: sessions.score_chunk_size must be greater than 0");
        }

        if let Some(ref pg) = self.database.postgres
            && pg.url.trim().is_empty()
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when transactional backend is postgres"
            );
        }

        if let Some(ref ch) = self.database.clickhouse
            && ch.url.trim().is_empty()
        {
            anyhow::bail!(
                "Configuration error: database.clickhouse.url is required when analytics backend is clickhouse"
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.sessionscope/sessionscope.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytics_backend_serde() {
        let backend: AnalyticsBackend = serde_json::from_str(r#""memory""#).unwrap();
        assert_eq!(backend, AnalyticsBackend::Memory);

        let backend: AnalyticsBackend = serde_json::from_str(r#""clickhouse""#).unwrap();
        assert_eq!(backend, AnalyticsBackend::Clickhouse);
    }

    #[test]
    fn test_listing_mode_serde_and_display() {
        let mode: ListingMode = serde_json::from_str(r#""unrestricted""#).unwrap();
        assert_eq!(mode, ListingMode::Unrestricted);
        assert_eq!(ListingMode::AllowList.to_string(), "allow_list");
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "database": {
                "transactional": "postgres",
                "analytics": "clickhouse",
                "postgres": { "url": "postgres://localhost/db", "max_connections": 5 },
                "clickhouse": { "url": "http://localhost:8123", "database": "traces" },
                "memory": { "fixture": "/tmp/fixture.json" }
            },
            "sessions": { "listing_mode": "unrestricted", "score_chunk_size": 100 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let db = config.database.as_ref().unwrap();
        assert_eq!(db.transactional, Some(TransactionalBackend::Postgres));
        assert_eq!(db.analytics, Some(AnalyticsBackend::Clickhouse));
        assert_eq!(db.postgres.as_ref().unwrap().max_connections, Some(5));
        assert_eq!(
            db.clickhouse.as_ref().unwrap().database,
            Some("traces".to_string())
        );
        let sessions = config.sessions.as_ref().unwrap();
        assert_eq!(sessions.listing_mode, Some(ListingMode::Unrestricted));
        assert_eq!(sessions.score_chunk_size, Some(100));
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "sessions": { "score_chunk_size": 10 }, "unknown_field": 123 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.extra.get("unknown_field").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{
                "database": { "analytics": "clickhouse", "clickhouse": { "url": "http://a:8123", "user": "x" } },
                "sessions": { "listing_mode": "unrestricted", "score_chunk_size": 50 }
            }"#,
        )
        .unwrap();
        let overlay: FileConfig = serde_json::from_str(
            r#"{
                "database": { "clickhouse": { "url": "http://b:8123" } },
                "sessions": { "score_chunk_size": 250 }
            }"#,
        )
        .unwrap();

        base.merge(overlay);

        let db = base.database.as_ref().unwrap();
        assert_eq!(db.analytics, Some(AnalyticsBackend::Clickhouse));
        let ch = db.clickhouse.as_ref().unwrap();
        assert_eq!(ch.url, Some("http://b:8123".to_string()));
        assert_eq!(ch.user, Some("x".to_string()));
        let sessions = base.sessions.as_ref().unwrap();
        assert_eq!(sessions.listing_mode, Some(ListingMode::Unrestricted));
        assert_eq!(sessions.score_chunk_size, Some(250));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_layers(&CliConfig::default(), FileConfig::default());

        assert_eq!(config.database.transactional, TransactionalBackend::Sqlite);
        assert_eq!(config.database.analytics, AnalyticsBackend::Memory);
        assert!(config.database.postgres.is_none());
        assert!(config.database.clickhouse.is_none());
        assert_eq!(config.sessions.listing_mode, ListingMode::AllowList);
        assert_eq!(config.sessions.score_chunk_size, 500);
        assert_eq!(config.sessions.metrics_score_limit, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_cli_override() {
        let file: FileConfig = serde_json::from_str(
            r#"{ "database": { "analytics": "clickhouse", "clickhouse": { "url": "http://file:8123" } },
                 "sessions": { "listing_mode": "unrestricted" } }"#,
        )
        .unwrap();
        let cli = CliConfig {
            clickhouse_url: Some("http://cli:8123".to_string()),
            listing_mode: Some(ListingMode::AllowList),
            ..Default::default()
        };

        let config = AppConfig::from_layers(&cli, file);

        let ch = config.database.clickhouse.as_ref().unwrap();
        assert_eq!(ch.url, "http://cli:8123");
        assert_eq!(ch.database, "sessionscope");
        assert!(ch.compression);
        assert_eq!(config.sessions.listing_mode, ListingMode::AllowList);
    }

    #[test]
    fn test_app_config_validation_requires_clickhouse_url() {
        let cli = CliConfig {
            analytics_backend: Some(AnalyticsBackend::Clickhouse),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, FileConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.clickhouse.url"));
    }

    #[test]
    fn test_app_config_validation_requires_postgres_url() {
        let cli = CliConfig {
            transactional_backend: Some(TransactionalBackend::Postgres),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, FileConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_validation_zero_chunk_size() {
        let file: FileConfig =
            serde_json::from_str(r#"{ "sessions": { "score_chunk_size": 0 } }"#).unwrap();
        let config = AppConfig::from_layers(&CliConfig::default(), file);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessionscope.json");
        std::fs::write(
            &path,
            r#"{ "database": { "memory": { "fixture": "/data/fixture.json" } } }"#,
        )
        .unwrap();

        let cli = CliConfig {
            config: Some(path),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(
            config.database.memory_fixture,
            Some(PathBuf::from("/data/fixture.json"))
        );
    }

    #[test]
    fn test_load_missing_config_file() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/sessionscope.json")),
            ..Default::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }
}
