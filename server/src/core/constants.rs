// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "SessionScope";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "sessionscope";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".sessionscope";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "sessionscope.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SESSIONSCOPE_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SESSIONSCOPE_LOG";

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "SESSIONSCOPE_DATA_DIR";

/// Environment variable for the transactional backend (sqlite or postgres)
pub const ENV_TRANSACTIONAL_BACKEND: &str = "SESSIONSCOPE_TRANSACTIONAL_BACKEND";

/// Environment variable for the analytics backend (memory or clickhouse)
pub const ENV_ANALYTICS_BACKEND: &str = "SESSIONSCOPE_ANALYTICS_BACKEND";

/// Environment variable for the PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "SESSIONSCOPE_POSTGRES_URL";

/// Environment variable for the ClickHouse connection URL
pub const ENV_CLICKHOUSE_URL: &str = "SESSIONSCOPE_CLICKHOUSE_URL";

/// Environment variable for the SQLite database file
pub const ENV_SQLITE_PATH: &str = "SESSIONSCOPE_SQLITE_PATH";

/// Environment variable for the memory backend fixture file
pub const ENV_MEMORY_FIXTURE: &str = "SESSIONSCOPE_MEMORY_FIXTURE";

// =============================================================================
// Environment Variables - Sessions
// =============================================================================

/// Environment variable for the conversation listing mode
pub const ENV_LISTING_MODE: &str = "SESSIONSCOPE_LISTING_MODE";

/// Environment variable for the acting user of CLI mutations
pub const ENV_ACTOR: &str = "SESSIONSCOPE_ACTOR";

// =============================================================================
// SQLite Settings
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "sessionscope.db";

/// SQLite max connections in pool
pub const SQLITE_MAX_CONNECTIONS: u32 = 8;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLite page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-16000";

// =============================================================================
// PostgreSQL Settings
// =============================================================================

/// Default maximum pool connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default minimum pool connections kept warm
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout in seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default max connection lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Default statement timeout in seconds
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// ClickHouse Settings
// =============================================================================

/// Default ClickHouse database name
pub const CLICKHOUSE_DEFAULT_DATABASE: &str = "sessionscope";

/// Default ClickHouse query timeout in seconds
pub const CLICKHOUSE_DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Session Query Limits
// =============================================================================

/// Ids per score/cost sub-query
pub const DEFAULT_SCORE_CHUNK_SIZE: usize = 500;

/// Session scores fetched for the metrics path
pub const DEFAULT_METRICS_SCORE_LIMIT: u32 = 1000;

/// User-id options returned by filter options
pub const FILTER_OPTIONS_USER_LIMIT: u32 = 1000;

/// Maximum size of filter JSON in bytes (64KB)
pub const MAX_FILTER_JSON_SIZE: usize = 64 * 1024;

/// Maximum number of filters allowed per request
pub const MAX_FILTERS: usize = 50;
