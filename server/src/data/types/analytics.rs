//! Event store row types and query parameters
//!
//! Physical rows (`*EventRow`) are the append-only versions written by
//! ingestion. Derived rows are what the event store hands back after
//! deduplication and aggregation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::data::filters::{Filter, OrderBy};

// ============================================================================
// Physical event rows
// ============================================================================

/// One physical version of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEventRow {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub event_ts: DateTime<Utc>,
}

/// One physical version of an observation (generation, span, event)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEventRow {
    pub id: String,
    pub trace_id: String,
    pub project_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_input: i64,
    #[serde(default)]
    pub usage_output: i64,
    #[serde(default)]
    pub usage_total: i64,
    #[serde(default)]
    pub cost_input: Decimal,
    #[serde(default)]
    pub cost_output: Decimal,
    #[serde(default)]
    pub cost_total: Decimal,
    pub event_ts: DateTime<Utc>,
}

/// One physical version of a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEventRow {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub observation_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub string_value: Option<String>,
    pub data_type: String,
    pub source: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub event_ts: DateTime<Utc>,
}

fn default_environment() -> String {
    "default".to_string()
}

// ============================================================================
// Score enums (shared by the store and the score domain)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreDataType {
    Numeric,
    Categorical,
    Boolean,
}

impl ScoreDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "NUMERIC",
            Self::Categorical => "CATEGORICAL",
            Self::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for ScoreDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NUMERIC" => Ok(Self::Numeric),
            "CATEGORICAL" => Ok(Self::Categorical),
            "BOOLEAN" => Ok(Self::Boolean),
            other => Err(format!("unknown score data type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreSource {
    #[serde(rename = "API")]
    Api,
    #[serde(rename = "EVAL")]
    Eval,
    #[serde(rename = "ANNOTATION")]
    Annotation,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Eval => "EVAL",
            Self::Annotation => "ANNOTATION",
        }
    }
}

impl fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "API" => Ok(Self::Api),
            "EVAL" => Ok(Self::Eval),
            "ANNOTATION" => Ok(Self::Annotation),
            other => Err(format!("unknown score source: {}", other)),
        }
    }
}

// ============================================================================
// Derived rows
// ============================================================================

/// Session row of the listing path (no observation joins)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAggregateRow {
    #[serde(rename = "id")]
    pub session_id: String,
    pub user_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub count_traces: u64,
    pub trace_tags: Vec<String>,
    pub environment: String,
}

/// Session row of the metrics path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetricsRow {
    #[serde(rename = "id")]
    pub session_id: String,
    pub user_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub count_traces: u64,
    pub trace_tags: Vec<String>,
    pub environment: String,
    pub total_observations: u64,
    /// Seconds between the first and the last trace
    pub session_duration: i64,
    pub input_cost: Decimal,
    pub output_cost: Decimal,
    pub total_cost: Decimal,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

/// Trace belonging to a session, as needed by the session detail
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceIdentifier {
    pub id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

/// Deduplicated score as stored, before validation
///
/// The field rules are the structural half of score validation; value and
/// enum checks happen when the row is converted into a domain score.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct RawScoreRow {
    #[validate(length(min = 1, max = 256))]
    pub id: String,
    pub project_id: String,
    #[validate(length(min = 1, max = 256))]
    pub trace_id: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub session_id: Option<String>,
    pub observation_id: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    pub value: Option<f64>,
    pub string_value: Option<String>,
    pub data_type: String,
    pub source: String,
    #[validate(length(max = 4096))]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ScoreEventRow> for RawScoreRow {
    fn from(row: &ScoreEventRow) -> Self {
        Self {
            id: row.id.clone(),
            project_id: row.project_id.clone(),
            trace_id: row.trace_id.clone(),
            session_id: row.session_id.clone(),
            observation_id: row.observation_id.clone(),
            name: row.name.clone(),
            value: row.value,
            string_value: row.string_value.clone(),
            data_type: row.data_type.clone(),
            source: row.source.clone(),
            comment: row.comment.clone(),
            timestamp: row.timestamp,
        }
    }
}

/// Result for filter option value with count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptionRow {
    pub value: String,
    pub count: u64,
}

/// Distinct score name, with distinct string values for categorical scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreNameRow {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

// ============================================================================
// Query parameters
// ============================================================================

/// Parameters for the session listing, counting and metrics queries
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub project_id: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// `Some(empty)` means no session can match
    pub allowed_user_ids: Option<Vec<String>>,
}

impl SessionQuery {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_order_by(mut self, order_by: Option<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_page(mut self, page: Option<u32>, limit: Option<u32>) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn with_allowed_user_ids(mut self, allowed: Option<Vec<String>>) -> Self {
        self.allowed_user_ids = allowed;
        self
    }

    /// `(limit, offset)` when both page and limit are given
    pub fn pagination(&self) -> Option<(u32, u64)> {
        match (self.page, self.limit) {
            (Some(page), Some(limit)) => Some((limit, u64::from(limit) * u64::from(page))),
            _ => None,
        }
    }

    /// True when the allow-list is present but empty
    pub fn excludes_everything(&self) -> bool {
        self.allowed_user_ids
            .as_ref()
            .is_some_and(|allowed| allowed.is_empty())
    }
}

/// What a score lookup is keyed on
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreTarget {
    Traces(Vec<String>),
    Sessions(Vec<String>),
}

impl ScoreTarget {
    pub fn ids(&self) -> &[String] {
        match self {
            Self::Traces(ids) | Self::Sessions(ids) => ids,
        }
    }
}

/// Parameters for score lookups
#[derive(Debug, Clone)]
pub struct ScoreQuery {
    pub project_id: String,
    pub target: ScoreTarget,
    /// Lower bound on score timestamp, used for partition pruning
    pub min_timestamp: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl ScoreQuery {
    pub fn new(project_id: impl Into<String>, target: ScoreTarget) -> Self {
        Self {
            project_id: project_id.into(),
            target,
            min_timestamp: None,
            limit: None,
            offset: None,
        }
    }

    pub fn with_min_timestamp(mut self, min_timestamp: Option<DateTime<Utc>>) -> Self {
        self.min_timestamp = min_timestamp;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>, offset: Option<u64>) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
