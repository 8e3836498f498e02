//! Join event store sessions with their relational flags
//!
//! Output order is the input order; nothing here sorts.

use std::collections::HashMap;

use super::types::{Session, SessionFlags, SessionWithMetrics};
use crate::data::types::{SessionAggregateRow, SessionMetadata, SessionMetricsRow};
use crate::domain::scores::{Score, aggregate_scores};

pub fn flags_for(metadata: &HashMap<String, SessionMetadata>, session_id: &str) -> SessionFlags {
    metadata
        .get(session_id)
        .map(|m| SessionFlags {
            bookmarked: m.bookmarked,
            public: m.public,
        })
        .unwrap_or_default()
}

pub fn merge_sessions(
    rows: Vec<SessionAggregateRow>,
    metadata: &HashMap<String, SessionMetadata>,
) -> Vec<Session> {
    rows.into_iter()
        .map(|aggregate| Session {
            flags: flags_for(metadata, &aggregate.session_id),
            aggregate,
        })
        .collect()
}

/// Attach flags and the rollup of each session's own scores
pub fn merge_metrics(
    rows: Vec<SessionMetricsRow>,
    metadata: &HashMap<String, SessionMetadata>,
    scores: &[Score],
) -> Vec<SessionWithMetrics> {
    let mut by_session: HashMap<&str, Vec<Score>> = HashMap::new();
    for score in scores {
        if let Some(session_id) = score.session_id.as_deref() {
            by_session
                .entry(session_id)
                .or_default()
                .push(score.clone());
        }
    }

    rows.into_iter()
        .map(|metrics| {
            let scores = by_session
                .get(metrics.session_id.as_str())
                .map(|s| aggregate_scores(s))
                .unwrap_or_default();
            SessionWithMetrics {
                flags: flags_for(metadata, &metrics.session_id),
                metrics,
                scores,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(id: &str) -> SessionAggregateRow {
        SessionAggregateRow {
            session_id: id.to_string(),
            user_ids: vec!["u".to_string()],
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            count_traces: 1,
            trace_tags: vec![],
            environment: "default".to_string(),
        }
    }

    fn meta(id: &str, bookmarked: bool, public: bool) -> SessionMetadata {
        SessionMetadata {
            id: id.to_string(),
            project_id: "p".to_string(),
            bookmarked,
            public,
            environment: "default".to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_merge_preserves_order_and_defaults() {
        let metadata: HashMap<String, SessionMetadata> =
            [("b".to_string(), meta("b", true, true))].into();
        let merged = merge_sessions(vec![row("c"), row("b"), row("a")], &metadata);

        let ids: Vec<_> = merged.iter().map(|s| s.aggregate.session_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(merged[0].flags, SessionFlags::default());
        assert_eq!(
            merged[1].flags,
            SessionFlags {
                bookmarked: true,
                public: true
            }
        );
    }

    #[test]
    fn test_serialized_session_has_flags_inline() {
        let merged = merge_sessions(vec![row("a")], &HashMap::new());
        let json = serde_json::to_value(&merged[0]).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["bookmarked"], false);
        assert_eq!(json["public"], false);
        assert_eq!(json["countTraces"], 1);
    }
}
