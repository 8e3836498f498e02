//! SQLite schema definitions
//!
//! `SCHEMA` is the full current schema applied to fresh databases.
//! Databases created at an older version are upgraded by `migrations`.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Session metadata (admin attributes, keyed by session id + project)
-- =============================================================================
CREATE TABLE IF NOT EXISTS session_metadata (
    id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    bookmarked INTEGER NOT NULL DEFAULT 0 CHECK(bookmarked IN (0, 1)),
    public INTEGER NOT NULL DEFAULT 0 CHECK(public IN (0, 1)),
    environment TEXT NOT NULL DEFAULT 'default',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (id, project_id)
);

CREATE INDEX IF NOT EXISTS idx_session_metadata_bookmarked
    ON session_metadata(project_id, bookmarked);

-- =============================================================================
-- 2. Accounts (conversation participants)
-- =============================================================================
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    identifier TEXT UNIQUE,
    metadata TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accounts_created ON accounts(created_at DESC);

-- =============================================================================
-- 3. Test users (usernames allowed into conversation listings)
-- =============================================================================
CREATE TABLE IF NOT EXISTS test_users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);
"#;

/// Version 2: test users table
pub const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS test_users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);
"#;
