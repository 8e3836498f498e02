//! ClickHouse schema definitions
//!
//! Event tables are plain append-only MergeTree tables. Every update to a
//! trace, observation or score is a new row with a later `event_ts`; readers
//! keep the latest version with `ORDER BY event_ts DESC LIMIT 1 BY id, project_id`.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id UInt8,
    version Int32,
    applied_at Int64,
    description Nullable(String)
) ENGINE = ReplacingMergeTree()
ORDER BY id
"#;

const TRACES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS traces (
    id String,
    project_id String,
    session_id Nullable(String),
    user_id Nullable(String),
    name Nullable(String),
    environment LowCardinality(String) DEFAULT 'default',
    tags Array(String),
    timestamp DateTime64(3),
    event_ts DateTime64(3),
    INDEX idx_session_id session_id TYPE bloom_filter(0.01) GRANULARITY 1,
    INDEX idx_user_id user_id TYPE bloom_filter(0.01) GRANULARITY 1
) ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (project_id, toDate(timestamp), id)
"#;

const OBSERVATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id String,
    trace_id String,
    project_id String,
    start_time DateTime64(3),
    end_time Nullable(DateTime64(3)),
    usage_input Int64 DEFAULT 0,
    usage_output Int64 DEFAULT 0,
    usage_total Int64 DEFAULT 0,
    cost_input Decimal(18, 12) DEFAULT 0,
    cost_output Decimal(18, 12) DEFAULT 0,
    cost_total Decimal(18, 12) DEFAULT 0,
    event_ts DateTime64(3),
    INDEX idx_trace_id trace_id TYPE bloom_filter(0.01) GRANULARITY 1
) ENGINE = MergeTree()
PARTITION BY toYYYYMM(start_time)
ORDER BY (project_id, toDate(start_time), trace_id, id)
"#;

const SCORES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scores (
    id String,
    project_id String,
    trace_id Nullable(String),
    session_id Nullable(String),
    observation_id Nullable(String),
    name String,
    value Nullable(Float64),
    string_value Nullable(String),
    data_type LowCardinality(String),
    source LowCardinality(String),
    comment Nullable(String),
    timestamp DateTime64(3),
    event_ts DateTime64(3),
    INDEX idx_trace_id trace_id TYPE bloom_filter(0.01) GRANULARITY 1,
    INDEX idx_session_id session_id TYPE bloom_filter(0.01) GRANULARITY 1
) ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (project_id, toDate(timestamp), name, id)
"#;

/// All statements of the initial schema, in creation order
pub fn generate_schema() -> Vec<&'static str> {
    vec![
        SCHEMA_VERSION_TABLE,
        TRACES_TABLE,
        OBSERVATIONS_TABLE,
        SCORES_TABLE,
    ]
}
