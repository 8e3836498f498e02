//! Shared data types for all database backends
//!
//! Row and parameter types used by both event store backends (memory,
//! ClickHouse) and both metadata store backends (SQLite, PostgreSQL).

mod analytics;
mod transactional;

// Re-export analytics types (event rows, derived rows and query params)
pub use analytics::{
    FilterOptionRow, ObservationEventRow, RawScoreRow, ScoreDataType, ScoreEventRow,
    ScoreNameRow, ScoreQuery, ScoreSource, ScoreTarget, SessionAggregateRow, SessionMetricsRow,
    SessionQuery, TraceEventRow, TraceIdentifier,
};

// Re-export transactional types (SQLite/PostgreSQL)
pub use transactional::{AccountKind, AccountRow, SessionMetadata, UserKind};
