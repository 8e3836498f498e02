//! EventStore trait implementation for ClickHouse
//!
//! ClickHouse operations are natively async so no spawn_blocking needed.

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

use super::ClickhouseService;
use super::repositories::{scores, sessions, traces};

#[async_trait]
impl EventStore for Arc<ClickhouseService> {
    // ==================== Session Aggregation ====================

    async fn list_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionAggregateRow>, DataError> {
        sessions::list_sessions(self.client(), query)
            .await
            .map_err(Into::into)
    }

    async fn count_sessions(&self, query: &SessionQuery) -> Result<u64, DataError> {
        sessions::count_sessions(self.client(), query)
            .await
            .map_err(Into::into)
    }

    async fn session_metrics(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionMetricsRow>, DataError> {
        sessions::session_metrics(self.client(), query)
            .await
            .map_err(Into::into)
    }

    async fn has_any_session(&self, project_id: &str) -> Result<bool, DataError> {
        sessions::has_any_session(self.client(), project_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Session Detail ====================

    async fn trace_identifiers_for_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<Vec<TraceIdentifier>, DataError> {
        traces::trace_identifiers_for_session(self.client(), project_id, session_id)
            .await
            .map_err(Into::into)
    }

    async fn scores(&self, query: &ScoreQuery) -> Result<Vec<RawScoreRow>, DataError> {
        scores::scores(self.client(), query)
            .await
            .map_err(Into::into)
    }

    async fn trace_cost(
        &self,
        project_id: &str,
        trace_ids: &[String],
        min_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<Decimal>, DataError> {
        traces::trace_cost(self.client(), project_id, trace_ids, min_timestamp)
            .await
            .map_err(Into::into)
    }

    // ==================== Filter Options ====================

    async fn user_options(
        &self,
        project_id: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<FilterOptionRow>, DataError> {
        traces::user_options(self.client(), project_id, filters, limit)
            .await
            .map_err(Into::into)
    }

    async fn tag_options(
        &self,
        project_id: &str,
        filters: &[Filter],
    ) -> Result<Vec<String>, DataError> {
        traces::tag_options(self.client(), project_id, filters)
            .await
            .map_err(Into::into)
    }

    async fn score_names(
        &self,
        project_id: &str,
        data_type: ScoreDataType,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScoreNameRow>, DataError> {
        scores::score_names(self.client(), project_id, data_type, from_timestamp)
            .await
            .map_err(Into::into)
    }
}
