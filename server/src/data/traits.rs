//! Repository traits for store backends
//!
//! This module defines traits that provide a unified interface for store
//! operations across backends. The event store is implemented by the memory
//! and ClickHouse backends, the metadata store by SQLite and PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::data::error::DataError;
use crate::data::filters::Filter;
use crate::data::types::{
    AccountRow, FilterOptionRow, RawScoreRow, ScoreDataType, ScoreNameRow, ScoreQuery,
    SessionAggregateRow, SessionMetadata, SessionMetricsRow, SessionQuery, TraceIdentifier,
};

// ============================================================================
// Event Store Trait
// ============================================================================

/// Read-only access to the append-only trace event store
///
/// Every method deduplicates physical rows by `(id, project_id)` keeping the
/// latest `event_ts` before grouping or filtering on anything else.
#[async_trait]
pub trait EventStore: Send + Sync {
    // ==================== Session Aggregation ====================

    /// Sessions with at least one member, filtered, ordered and paged
    async fn list_sessions(&self, query: &SessionQuery)
    -> Result<Vec<SessionAggregateRow>, DataError>;

    /// Number of sessions `list_sessions` would return without paging
    async fn count_sessions(&self, query: &SessionQuery) -> Result<u64, DataError>;

    /// Sessions with cost, usage and duration rollups
    async fn session_metrics(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionMetricsRow>, DataError>;

    /// Whether the project has any trace with a session id
    async fn has_any_session(&self, project_id: &str) -> Result<bool, DataError>;

    // ==================== Session Detail ====================

    /// Deduplicated traces of one session, oldest first
    async fn trace_identifiers_for_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<Vec<TraceIdentifier>, DataError>;

    /// Scores for a batch of traces or sessions, newest first
    async fn scores(&self, query: &ScoreQuery) -> Result<Vec<RawScoreRow>, DataError>;

    /// Summed observation cost of the given traces; `None` when no observation matched
    async fn trace_cost(
        &self,
        project_id: &str,
        trace_ids: &[String],
        min_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<Decimal>, DataError>;

    // ==================== Filter Options ====================

    /// Distinct user ids with trace counts, most frequent first
    async fn user_options(
        &self,
        project_id: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<FilterOptionRow>, DataError>;

    /// Distinct trace tags
    async fn tag_options(
        &self,
        project_id: &str,
        filters: &[Filter],
    ) -> Result<Vec<String>, DataError>;

    /// Distinct score names of one data type (with values for categorical)
    async fn score_names(
        &self,
        project_id: &str,
        data_type: ScoreDataType,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScoreNameRow>, DataError>;
}

// ============================================================================
// Metadata Repository Trait
// ============================================================================

/// Repository trait for relational metadata (sessions, accounts)
///
/// Implemented by SQLite and PostgreSQL backends.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    // ==================== Session Metadata ====================

    async fn get_session(
        &self,
        session_id: &str,
        project_id: &str,
    ) -> Result<Option<SessionMetadata>, DataError>;

    async fn lookup_sessions(
        &self,
        session_ids: &[String],
        project_id: &str,
    ) -> Result<HashMap<String, SessionMetadata>, DataError>;

    /// Idempotent insert; returns true if a row was created
    async fn register_session(
        &self,
        session_id: &str,
        project_id: &str,
        environment: &str,
    ) -> Result<bool, DataError>;

    /// `DataError::NotFound` when the row does not exist
    async fn set_bookmarked(
        &self,
        session_id: &str,
        project_id: &str,
        bookmarked: bool,
    ) -> Result<SessionMetadata, DataError>;

    /// `DataError::NotFound` when the row does not exist
    async fn set_public(
        &self,
        session_id: &str,
        project_id: &str,
        public: bool,
    ) -> Result<SessionMetadata, DataError>;

    async fn bookmarked_session_ids(&self, project_id: &str) -> Result<Vec<String>, DataError>;

    // ==================== Accounts ====================

    async fn list_accounts(&self) -> Result<Vec<AccountRow>, DataError>;

    async fn list_test_usernames(&self) -> Result<Vec<String>, DataError>;
}
