//! Request and response types of the session service

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use validator::Validate;

use crate::data::filters::{Filter, OrderBy};
use crate::data::types::{
    FilterOptionRow, ScoreNameRow, SessionAggregateRow, SessionMetricsRow, TraceIdentifier,
};
use crate::domain::scores::{AggregatedScore, Score};

/// Filtered, ordered and optionally paged session listing
#[derive(Debug, Clone, Default, Validate)]
pub struct SessionListRequest {
    #[validate(length(min = 1, max = 256))]
    pub project_id: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub page: Option<u32>,
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
    /// `Some(empty)` yields no sessions
    pub allowed_user_ids: Option<Vec<String>>,
}

impl SessionListRequest {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }
}

/// Relational flags joined onto a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionFlags {
    pub bookmarked: bool,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    #[serde(flatten)]
    pub aggregate: SessionAggregateRow,
    #[serde(flatten)]
    pub flags: SessionFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionWithMetrics {
    #[serde(flatten)]
    pub metrics: SessionMetricsRow,
    #[serde(flatten)]
    pub flags: SessionFlags,
    pub scores: BTreeMap<String, AggregatedScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCount {
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTrace {
    #[serde(flatten)]
    pub trace: TraceIdentifier,
    pub scores: Vec<Score>,
}

/// One session with its traces, scores, members and cost
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    pub project_id: String,
    pub environment: String,
    pub created_at: i64,
    #[serde(flatten)]
    pub flags: SessionFlags,
    pub traces: Vec<SessionTrace>,
    pub users: Vec<String>,
    pub total_cost: Decimal,
    pub scores: Vec<Score>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub user_ids: Vec<FilterOptionRow>,
    pub tags: Vec<String>,
    pub scores_numeric: Vec<String>,
    pub scores_categorical: Vec<ScoreNameRow>,
}

/// Lightweight session entry of the conversation listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionAggregateRow> for Conversation {
    fn from(row: SessionAggregateRow) -> Self {
        Self {
            id: row.session_id,
            user_ids: row.user_ids,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(SessionListRequest::new("p").validate().is_ok());
        assert!(SessionListRequest::new("").validate().is_err());

        let mut request = SessionListRequest::new("p");
        request.limit = Some(0);
        assert!(request.validate().is_err());
    }
}
