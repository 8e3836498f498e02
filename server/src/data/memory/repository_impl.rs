//! EventStore trait implementation for the in-memory store
//!
//! Evaluation is synchronous and short; reads hold a shared lock only for
//! the duration of one call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::data::error::DataError;
use crate::data::filters::Filter;
use crate::data::traits::EventStore;
use crate::data::types::{
    FilterOptionRow, RawScoreRow, ScoreDataType, ScoreNameRow, ScoreQuery, SessionAggregateRow,
    SessionMetricsRow, SessionQuery, TraceIdentifier,
};

use super::MemoryEventStore;

#[async_trait]
impl EventStore for Arc<MemoryEventStore> {
    // ==================== Session Aggregation ====================

    async fn list_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionAggregateRow>, DataError> {
        MemoryEventStore::list_sessions(self, query).map_err(Into::into)
    }

    async fn count_sessions(&self, query: &SessionQuery) -> Result<u64, DataError> {
        MemoryEventStore::count_sessions(self, query).map_err(Into::into)
    }

    async fn session_metrics(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionMetricsRow>, DataError> {
        MemoryEventStore::session_metrics(self, query).map_err(Into::into)
    }

    async fn has_any_session(&self, project_id: &str) -> Result<bool, DataError> {
        Ok(MemoryEventStore::has_any_session(self, project_id))
    }

    // ==================== Session Detail ====================

    async fn trace_identifiers_for_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<Vec<TraceIdentifier>, DataError> {
        Ok(MemoryEventStore::trace_identifiers_for_session(
            self, project_id, session_id,
        ))
    }

    async fn scores(&self, query: &ScoreQuery) -> Result<Vec<RawScoreRow>, DataError> {
        Ok(MemoryEventStore::scores(self, query))
    }

    async fn trace_cost(
        &self,
        project_id: &str,
        trace_ids: &[String],
        min_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<Decimal>, DataError> {
        Ok(MemoryEventStore::trace_cost(
            self,
            project_id,
            trace_ids,
            min_timestamp,
        ))
    }

    // ==================== Filter Options ====================

    async fn user_options(
        &self,
        project_id: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<FilterOptionRow>, DataError> {
        MemoryEventStore::user_options(self, project_id, filters, limit).map_err(Into::into)
    }

    async fn tag_options(
        &self,
        project_id: &str,
        filters: &[Filter],
    ) -> Result<Vec<String>, DataError> {
        MemoryEventStore::tag_options(self, project_id, filters).map_err(Into::into)
    }

    async fn score_names(
        &self,
        project_id: &str,
        data_type: ScoreDataType,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScoreNameRow>, DataError> {
        Ok(MemoryEventStore::score_names(
            self,
            project_id,
            data_type,
            from_timestamp,
        ))
    }
}
