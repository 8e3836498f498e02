//! Score row validation
//!
//! Rows are checked one at a time. A row that fails is dropped and handed to
//! the caller's callback; it never fails the batch.

use thiserror::Error;
use validator::Validate;

use super::types::{Score, ScoreValue};
use crate::data::types::{RawScoreRow, ScoreDataType, ScoreSource};

#[derive(Error, Debug)]
pub enum ScoreValidationError {
    #[error("invalid fields: {0}")]
    Fields(#[from] validator::ValidationErrors),

    #[error("{0}")]
    UnknownEnum(String),

    #[error("score is attached to neither a trace nor a session")]
    Unattached,

    #[error("{data_type} score requires {field}")]
    MissingValue {
        data_type: ScoreDataType,
        field: &'static str,
    },

    #[error("numeric score value must be finite")]
    NonFinite,

    #[error("boolean score value must be 0 or 1, got {0}")]
    InvalidBoolean(f64),
}

/// Parse one stored row into a typed score
pub fn parse_score(row: RawScoreRow) -> Result<Score, ScoreValidationError> {
    row.validate()?;

    let data_type: ScoreDataType = row.data_type.parse().map_err(ScoreValidationError::UnknownEnum)?;
    let source: ScoreSource = row.source.parse().map_err(ScoreValidationError::UnknownEnum)?;

    if row.trace_id.is_none() && row.session_id.is_none() {
        return Err(ScoreValidationError::Unattached);
    }

    let value = match data_type {
        ScoreDataType::Numeric => {
            let value = row.value.ok_or(ScoreValidationError::MissingValue {
                data_type,
                field: "value",
            })?;
            if !value.is_finite() {
                return Err(ScoreValidationError::NonFinite);
            }
            ScoreValue::Numeric { value }
        }
        ScoreDataType::Categorical => {
            let label = row
                .string_value
                .filter(|s| !s.is_empty())
                .ok_or(ScoreValidationError::MissingValue {
                    data_type,
                    field: "string_value",
                })?;
            ScoreValue::Categorical { label }
        }
        ScoreDataType::Boolean => {
            let value = row.value.ok_or(ScoreValidationError::MissingValue {
                data_type,
                field: "value",
            })?;
            if value != 0.0 && value != 1.0 {
                return Err(ScoreValidationError::InvalidBoolean(value));
            }
            let label = row
                .string_value
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| (if value == 1.0 { "True" } else { "False" }).to_string());
            ScoreValue::Boolean { value, label }
        }
    };

    Ok(Score {
        id: row.id,
        trace_id: row.trace_id,
        session_id: row.session_id,
        observation_id: row.observation_id,
        name: row.name,
        source,
        value,
        comment: row.comment,
        timestamp: row.timestamp,
    })
}

/// Validate a batch, returning the valid scores and the number dropped.
///
/// `on_invalid` receives the id of each dropped row and the reason.
pub fn validate_scores<F>(rows: Vec<RawScoreRow>, mut on_invalid: F) -> (Vec<Score>, usize)
where
    F: FnMut(&str, &ScoreValidationError),
{
    let mut valid = Vec::with_capacity(rows.len());
    let mut dropped = 0;
    for row in rows {
        let id = row.id.clone();
        match parse_score(row) {
            Ok(score) => valid.push(score),
            Err(e) => {
                dropped += 1;
                on_invalid(&id, &e);
            }
        }
    }
    (valid, dropped)
}


#[cfg(test)]
mod tests {
    use super::fixtures::raw;
    use super::*;

    #[test]
    fn test_ten_rows_two_invalid() {
        let mut rows: Vec<RawScoreRow> = (0..8)
            .map(|i| raw(&format!("ok{}", i), "NUMERIC", Some(i as f64), None))
            .collect();
        rows.insert(3, raw("bad-type", "PERCENT", Some(1.0), None));
        rows.push(raw("bad-value", "NUMERIC", None, None));

        let mut reported = Vec::new();
        let (scores, dropped) = validate_scores(rows, |id, _| reported.push(id.to_string()));

        assert_eq!(scores.len(), 8);
        assert_eq!(dropped, 2);
        assert_eq!(reported, vec!["bad-type", "bad-value"]);
        assert_eq!(scores[3].id, "ok3");
    }

    #[test]
    fn test_categorical_requires_label() {
        let err = parse_score(raw("c", "CATEGORICAL", None, Some(""))).unwrap_err();
        assert!(matches!(
            err,
            ScoreValidationError::MissingValue {
                field: "string_value",
                ..
            }
        ));
        let score = parse_score(raw("c", "CATEGORICAL", None, Some("good"))).unwrap();
        assert_eq!(
            score.value,
            ScoreValue::Categorical {
                label: "good".to_string()
            }
        );
    }

    #[test]
    fn test_boolean_value_and_default_label() {
        let score = parse_score(raw("b", "BOOLEAN", Some(0.0), None)).unwrap();
        assert_eq!(
            score.value,
            ScoreValue::Boolean {
                value: 0.0,
                label: "False".to_string()
            }
        );
        assert!(matches!(
            parse_score(raw("b", "BOOLEAN", Some(0.5), None)),
            Err(ScoreValidationError::InvalidBoolean(_))
        ));
    }

    #[test]
    fn test_structural_rules() {
        let mut row = raw("x", "NUMERIC", Some(1.0), None);
        row.name = String::new();
        assert!(matches!(
            parse_score(row),
            Err(ScoreValidationError::Fields(_))
        ));

        let mut row = raw("x", "NUMERIC", Some(1.0), None);
        row.trace_id = None;
        assert!(matches!(
            parse_score(row),
            Err(ScoreValidationError::Unattached)
        ));

        let mut row = raw("x", "NUMERIC", Some(f64::NAN), None);
        row.source = "EVAL".to_string();
        assert!(matches!(
            parse_score(row),
            Err(ScoreValidationError::NonFinite)
        ));

        let mut row = raw("x", "NUMERIC", Some(1.0), None);
        row.source = "robot".to_string();
        assert!(matches!(
            parse_score(row),
            Err(ScoreValidationError::UnknownEnum(_))
        ));
    }
}
