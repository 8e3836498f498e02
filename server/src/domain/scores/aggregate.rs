//! Score rollups for session metrics

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{Score, ScoreValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

/// Rollup of all scores sharing a name, source and data type
///
/// `comment` and `id` are only set when the group holds a single score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregatedScore {
    Numeric {
        values: Vec<f64>,
        average: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Categorical {
        values: Vec<String>,
        #[serde(rename = "valueCounts")]
        value_counts: Vec<ValueCount>,
        #[serde(skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

/// `name-source-dataType`, with dashes in the name replaced so the key splits cleanly
pub fn aggregate_key(score: &Score) -> String {
    format!(
        "{}-{}-{}",
        score.name.replace('-', "_"),
        score.source,
        score.data_type()
    )
}

/// Group scores by key. Boolean scores roll up like categorical ones on their label.
pub fn aggregate_scores(scores: &[Score]) -> BTreeMap<String, AggregatedScore> {
    let mut groups: BTreeMap<String, Vec<&Score>> = BTreeMap::new();
    for score in scores {
        groups.entry(aggregate_key(score)).or_default().push(score);
    }

    groups
        .into_iter()
        .map(|(key, group)| {
            let single = (group.len() == 1).then(|| group[0]);
            let comment = single.and_then(|s| s.comment.clone());
            let id = single.map(|s| s.id.clone());

            let aggregated = match group[0].value {
                ScoreValue::Numeric { .. } => {
                    let values: Vec<f64> = group
                        .iter()
                        .filter_map(|s| match s.value {
                            ScoreValue::Numeric { value } => Some(value),
                            _ => None,
                        })
                        .collect();
                    let average = values.iter().sum::<f64>() / values.len() as f64;
                    AggregatedScore::Numeric {
                        values,
                        average,
                        comment,
                        id,
                    }
                }
                ScoreValue::Categorical { .. } | ScoreValue::Boolean { .. } => {
                    let values: Vec<String> = group
                        .iter()
                        .filter_map(|s| match &s.value {
                            ScoreValue::Categorical { label } | ScoreValue::Boolean { label, .. } => {
                                Some(label.clone())
                            }
                            ScoreValue::Numeric { .. } => None,
                        })
                        .collect();
                    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
                    for value in &values {
                        *counts.entry(value.as_str()).or_default() += 1;
                    }
                    let value_counts = counts
                        .into_iter()
                        .map(|(value, count)| ValueCount {
                            value: value.to_string(),
                            count,
                        })
                        .collect();
                    AggregatedScore::Categorical {
                        values,
                        value_counts,
                        comment,
                        id,
                    }
                }
            };
            (key, aggregated)
        })
        .collect()
}
