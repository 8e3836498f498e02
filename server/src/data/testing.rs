//! Test doubles for the store traits

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use crate::data::error::DataError;
use crate::data::filters::Filter;
use crate::data::memory::{EventLog, MemoryEventStore};
use crate::data::sqlite::SqliteService;
use crate::data::traits::{EventStore, MetadataRepository};
use crate::data::types::{
    AccountRow, FilterOptionRow, RawScoreRow, ScoreDataType, ScoreNameRow, ScoreQuery, SessionAggregateRow,
    SessionMetadata, SessionMetricsRow, SessionQuery, TraceIdentifier,
};

/// Error injected by the failing test doubles
fn injected(operation: &str) -> DataError {
    DataError::backend_unavailable("test", format!("injected failure in {}", operation))
}

/// Event store wrapper that counts every query it forwards and can fail
/// one operation
pub struct CountingStore {
    inner: Arc<dyn EventStore>,
    calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn EventStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    /// Every call to `operation` returns a backend error
    pub fn failing_on(inner: Arc<dyn EventStore>, operation: &'static str) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::new(inner)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self, operation: &'static str) -> Result<(), DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(operation) {
            return Err(injected(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for CountingStore {
    async fn list_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionAggregateRow>, DataError> {
        self.hit("list_sessions")?;
        self.inner.list_sessions(query).await
    }

    async fn count_sessions(&self, query: &SessionQuery) -> Result<u64, DataError> {
        self.hit("count_sessions")?;
        self.inner.count_sessions(query).await
    }

    async fn session_metrics(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionMetricsRow>, DataError> {
        self.hit("session_metrics")?;
        self.inner.session_metrics(query).await
    }

    async fn has_any_session(&self, project_id: &str) -> Result<bool, DataError> {
        self.hit("has_any_session")?;
        self.inner.has_any_session(project_id).await
    }

    async fn trace_identifiers_for_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<Vec<TraceIdentifier>, DataError> {
        self.hit("trace_identifiers_for_session")?;
        self.inner
            .trace_identifiers_for_session(project_id, session_id)
            .await
    }

    async fn scores(&self, query: &ScoreQuery) -> Result<Vec<RawScoreRow>, DataError> {
        self.hit("scores")?;
        self.inner.scores(query).await
    }

    async fn trace_cost(
        &self,
        project_id: &str,
        trace_ids: &[String],
        min_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<Decimal>, DataError> {
        self.hit("trace_cost")?;
        self.inner
            .trace_cost(project_id, trace_ids, min_timestamp)
            .await
    }

    async fn user_options(
        &self,
        project_id: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<FilterOptionRow>, DataError> {
        self.hit("user_options")?;
        self.inner.user_options(project_id, filters, limit).await
    }

    async fn tag_options(
        &self,
        project_id: &str,
        filters: &[Filter],
    ) -> Result<Vec<String>, DataError> {
        self.hit("tag_options")?;
        self.inner.tag_options(project_id, filters).await
    }

    async fn score_names(
        &self,
        project_id: &str,
        data_type: ScoreDataType,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScoreNameRow>, DataError> {
        self.hit("score_names")?;
        self.inner
            .score_names(project_id, data_type, from_timestamp)
            .await
    }
}

/// Metadata store wrapper that fails one operation and forwards the rest
pub struct FailingMetadata {
    inner: Arc<dyn MetadataRepository>,
    fail_on: &'static str,
}

impl FailingMetadata {
    pub fn new(inner: Arc<dyn MetadataRepository>, fail_on: &'static str) -> Self {
        Self { inner, fail_on }
    }

    fn check(&self, operation: &'static str) -> Result<(), DataError> {
        if self.fail_on == operation {
            return Err(injected(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataRepository for FailingMetadata {
    async fn get_session(
        &self,
        session_id: &str,
        project_id: &str,
    ) -> Result<Option<SessionMetadata>, DataError> {
        self.check("get_session")?;
        self.inner.get_session(session_id, project_id).await
    }

    async fn lookup_sessions(
        &self,
        session_ids: &[String],
        project_id: &str,
    ) -> Result<HashMap<String, SessionMetadata>, DataError> {
        self.check("lookup_sessions")?;
        self.inner.lookup_sessions(session_ids, project_id).await
    }

    async fn register_session(
        &self,
        session_id: &str,
        project_id: &str,
        environment: &str,
    ) -> Result<bool, DataError> {
        self.check("register_session")?;
        self.inner
            .register_session(session_id, project_id, environment)
            .await
    }

    async fn set_bookmarked(
        &self,
        session_id: &str,
        project_id: &str,
        bookmarked: bool,
    ) -> Result<SessionMetadata, DataError> {
        self.check("set_bookmarked")?;
        self.inner
            .set_bookmarked(session_id, project_id, bookmarked)
            .await
    }

    async fn set_public(
        &self,
        session_id: &str,
        project_id: &str,
        public: bool,
    ) -> Result<SessionMetadata, DataError> {
        self.check("set_public")?;
        self.inner.set_public(session_id, project_id, public).await
    }

    async fn bookmarked_session_ids(&self, project_id: &str) -> Result<Vec<String>, DataError> {
        self.check("bookmarked_session_ids")?;
        self.inner.bookmarked_session_ids(project_id).await
    }

    async fn list_accounts(&self) -> Result<Vec<AccountRow>, DataError> {
        self.check("list_accounts")?;
        self.inner.list_accounts().await
    }

    async fn list_test_usernames(&self) -> Result<Vec<String>, DataError> {
        self.check("list_test_usernames")?;
        self.inner.list_test_usernames().await
    }
}

/// Memory event store seeded with `log`
pub fn memory_store(log: EventLog) -> Arc<dyn EventStore> {
    Arc::new(Arc::new(MemoryEventStore::from_log(log)))
}

/// Migrated SQLite metadata store in a temporary directory
pub async fn metadata_store() -> (Arc<SqliteService>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let service = SqliteService::init(&dir.path().join("meta.db"))
        .await
        .unwrap();
    (Arc::new(service), dir)
}
