//! Validated score types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::types::{ScoreDataType, ScoreSource};

/// Typed value of a score, one shape per data type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dataType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreValue {
    Numeric {
        value: f64,
    },
    Categorical {
        #[serde(rename = "stringValue")]
        label: String,
    },
    /// `value` is 0 or 1, `label` its display string
    Boolean {
        value: f64,
        #[serde(rename = "stringValue")]
        label: String,
    },
}

impl ScoreValue {
    pub fn data_type(&self) -> ScoreDataType {
        match self {
            Self::Numeric { .. } => ScoreDataType::Numeric,
            Self::Categorical { .. } => ScoreDataType::Categorical,
            Self::Boolean { .. } => ScoreDataType::Boolean,
        }
    }
}

/// Score that passed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: String,
    pub trace_id: Option<String>,
    pub session_id: Option<String>,
    pub observation_id: Option<String>,
    pub name: String,
    pub source: ScoreSource,
    #[serde(flatten)]
    pub value: ScoreValue,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Score {
    pub fn data_type(&self) -> ScoreDataType {
        self.value.data_type()
    }
}
