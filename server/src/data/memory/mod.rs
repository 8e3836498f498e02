//! In-memory event store
//!
//! Holds physical trace, observation and score versions in process and
//! evaluates the session pipeline over them. Used for local runs, demos
//! and tests; an optional JSON fixture seeds it at startup:
//!
//! ```json
//! { "traces": [...], "observations": [...], "scores": [...] }
//! ```

pub mod error;
mod pipeline;
mod repository_impl;

pub use error::MemoryError;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::filters::{ColumnStage, Filter};
use crate::data::types::{
    FilterOptionRow, ObservationEventRow, RawScoreRow, ScoreDataType, ScoreEventRow, ScoreNameRow,
    ScoreQuery, ScoreTarget, SessionAggregateRow, SessionMetricsRow, SessionQuery, TraceEventRow,
    TraceIdentifier,
};

use pipeline::{latest, latest_observations, latest_traces, stage_filters, trace_matches};

/// Raw append-only event rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(default)]
    pub traces: Vec<TraceEventRow>,
    #[serde(default)]
    pub observations: Vec<ObservationEventRow>,
    #[serde(default)]
    pub scores: Vec<ScoreEventRow>,
}

/// Event store backed by process memory
#[derive(Default)]
pub struct MemoryEventStore {
    log: RwLock<EventLog>,
}

impl MemoryEventStore {
    /// Create the store, loading the fixture file when given
    pub async fn init(fixture: Option<&Path>) -> Result<Self, MemoryError> {
        let log = match fixture {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                serde_json::from_str(&content).map_err(|e| MemoryError::Fixture {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })?
            }
            None => EventLog::default(),
        };

        tracing::debug!(
            traces = log.traces.len(),
            observations = log.observations.len(),
            scores = log.scores.len(),
            fixture = ?fixture,
            "MemoryEventStore initialized"
        );
        Ok(Self::from_log(log))
    }

    pub fn from_log(log: EventLog) -> Self {
        Self {
            log: RwLock::new(log),
        }
    }

    /// Append physical versions; later `event_ts` wins on read
    pub fn append(&self, events: EventLog) {
        let mut log = self.log.write();
        log.traces.extend(events.traces);
        log.observations.extend(events.observations);
        log.scores.extend(events.scores);
    }

    pub async fn close(&self) {
        tracing::debug!("Memory event store closed");
    }

    // ==================== Session Aggregation ====================

    pub fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<SessionAggregateRow>, MemoryError> {
        let log = self.log.read();
        let records = pipeline::sessions(&log.traces, &log.observations, query)?;
        Ok(pipeline::page(records, query)
            .iter()
            .map(|r| r.to_aggregate())
            .collect())
    }

    pub fn count_sessions(&self, query: &SessionQuery) -> Result<u64, MemoryError> {
        let log = self.log.read();
        Ok(pipeline::sessions(&log.traces, &log.observations, query)?.len() as u64)
    }

    pub fn session_metrics(&self, query: &SessionQuery) -> Result<Vec<SessionMetricsRow>, MemoryError> {
        let log = self.log.read();
        let records = pipeline::sessions(&log.traces, &log.observations, query)?;
        Ok(pipeline::page(records, query)
            .iter()
            .map(|r| r.to_metrics())
            .collect())
    }

    pub fn has_any_session(&self, project_id: &str) -> bool {
        let log = self.log.read();
        latest_traces(&log.traces, project_id)
            .iter()
            .any(|t| t.session_id.as_deref().is_some_and(|s| !s.is_empty()))
    }

    // ==================== Session Detail ====================

    pub fn trace_identifiers_for_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Vec<TraceIdentifier> {
        let log = self.log.read();
        let mut traces: Vec<TraceIdentifier> = latest_traces(&log.traces, project_id)
            .into_iter()
            .filter(|t| t.session_id.as_deref() == Some(session_id))
            .map(|t| TraceIdentifier {
                id: t.id.clone(),
                user_id: t.user_id.clone(),
                name: t.name.clone(),
                environment: t.environment.clone(),
                timestamp: t.timestamp,
            })
            .collect();
        traces.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        traces
    }

    pub fn scores(&self, query: &ScoreQuery) -> Vec<RawScoreRow> {
        let log = self.log.read();
        let targets: HashSet<&str> = query.target.ids().iter().map(String::as_str).collect();
        let mut rows: Vec<RawScoreRow> = latest(
            log.scores
                .iter()
                .filter(|s| s.project_id == query.project_id)
                .filter(|s| query.min_timestamp.is_none_or(|min| s.timestamp >= min)),
            |s| (s.id.clone(), s.project_id.clone()),
            |s| s.event_ts,
        )
        .into_iter()
        .filter(|s| {
            let key = match query.target {
                ScoreTarget::Traces(_) => s.trace_id.as_deref(),
                ScoreTarget::Sessions(_) => s.session_id.as_deref(),
            };
            key.is_some_and(|k| targets.contains(k))
        })
        .map(RawScoreRow::from)
        .collect();

        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        match query.limit {
            Some(limit) => rows
                .into_iter()
                .skip(usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX))
                .take(limit as usize)
                .collect(),
            None => rows,
        }
    }

    pub fn trace_cost(
        &self,
        project_id: &str,
        trace_ids: &[String],
        min_timestamp: Option<DateTime<Utc>>,
    ) -> Option<Decimal> {
        let log = self.log.read();
        let wanted: HashSet<&str> = trace_ids.iter().map(String::as_str).collect();
        let matched: Vec<&ObservationEventRow> =
            latest_observations(&log.observations, project_id, min_timestamp)
                .into_iter()
                .filter(|o| wanted.contains(o.trace_id.as_str()))
                .collect();
        if matched.is_empty() {
            return None;
        }
        Some(
            matched
                .iter()
                .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.cost_total)),
        )
    }

    // ==================== Filter Options ====================

    pub fn user_options(
        &self,
        project_id: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<FilterOptionRow>, MemoryError> {
        let trace_filters = stage_filters(filters, ColumnStage::Trace)?;
        let log = self.log.read();
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for trace in latest_traces(&log.traces, project_id) {
            if !trace_matches(trace, &trace_filters) {
                continue;
            }
            if let Some(user) = trace.user_id.as_deref().filter(|u| !u.is_empty()) {
                *counts.entry(user).or_default() += 1;
            }
        }
        let mut options: Vec<FilterOptionRow> = counts
            .into_iter()
            .map(|(value, count)| FilterOptionRow {
                value: value.to_string(),
                count,
            })
            .collect();
        options.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        options.truncate(limit as usize);
        Ok(options)
    }

    pub fn tag_options(&self, project_id: &str, filters: &[Filter]) -> Result<Vec<String>, MemoryError> {
        let trace_filters = stage_filters(filters, ColumnStage::Trace)?;
        let log = self.log.read();
        let tags: BTreeSet<&str> = latest_traces(&log.traces, project_id)
            .into_iter()
            .filter(|t| trace_matches(t, &trace_filters))
            .flat_map(|t| t.tags.iter().map(String::as_str))
            .collect();
        Ok(tags.into_iter().map(str::to_string).collect())
    }

    pub fn score_names(
        &self,
        project_id: &str,
        data_type: ScoreDataType,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Vec<ScoreNameRow> {
        let log = self.log.read();
        let mut names: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let scores = latest(
            log.scores
                .iter()
                .filter(|s| s.project_id == project_id)
                .filter(|s| from_timestamp.is_none_or(|from| s.timestamp >= from)),
            |s| (s.id.clone(), s.project_id.clone()),
            |s| s.event_ts,
        );
        for score in scores {
            if score.data_type != data_type.as_str() {
                continue;
            }
            let values = names.entry(score.name.as_str()).or_default();
            if data_type != ScoreDataType::Numeric
                && let Some(value) = score.string_value.as_deref()
            {
                values.insert(value);
            }
        }
        names
            .into_iter()
            .map(|(name, values)| ScoreNameRow {
                name: name.to_string(),
                values: values.into_iter().map(str::to_string).collect(),
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::data::filters::{NumberOp, OrderBy, OrderDirection};

    fn store(log: EventLog) -> MemoryEventStore {
        MemoryEventStore::from_log(log)
    }

    #[test]
    fn test_dedup_latest_version_wins() {
        let mut old = trace("t1", "s1", Some("alice"), 0);
        old.event_ts = ts(1);
        let mut new = trace("t1", "s1", Some("bob"), 0);
        new.event_ts = ts(2);
        let s = store(EventLog {
            traces: vec![new, old],
            ..Default::default()
        });

        let rows = s.list_sessions(&SessionQuery::new("p1")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_ids, vec!["bob".to_string()]);
        assert_eq!(rows[0].count_traces, 1);
    }

    #[test]
    fn test_session_requires_a_user() {
        let s = store(EventLog {
            traces: vec![
                trace("t1", "anon", None, 0),
                trace("t2", "anon", Some(""), 1),
                trace("t3", "named", Some("alice"), 2),
                trace("t4", "named", None, 3),
            ],
            ..Default::default()
        });
        let query = SessionQuery::new("p1");
        let rows = s.list_sessions(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "named");
        assert_eq!(rows[0].count_traces, 2);
        assert_eq!(s.count_sessions(&query).unwrap(), 1);
    }

    #[test]
    fn test_user_dropped_by_later_version_removes_session() {
        let first = trace("t1", "s1", Some("alice"), 0);
        let mut second = trace("t1", "s1", None, 0);
        second.event_ts = ts(10);
        let s = store(EventLog {
            traces: vec![first, second],
            ..Default::default()
        });
        assert!(s.list_sessions(&SessionQuery::new("p1")).unwrap().is_empty());
    }

    #[test]
    fn test_cost_sum_is_exact() {
        let s = store(EventLog {
            traces: vec![trace("t1", "s1", Some("u"), 0)],
            observations: vec![
                observation("o1", "t1", "0.1", 0),
                observation("o2", "t1", "0.2", 0),
                observation("o3", "t1", "0.3", 0),
            ],
            ..Default::default()
        });
        let metrics = s.session_metrics(&SessionQuery::new("p1")).unwrap();
        assert_eq!(metrics[0].total_cost, "0.6".parse::<Decimal>().unwrap());
        assert_eq!(metrics[0].total_observations, 3);
        assert_eq!(metrics[0].total_tokens, 45);
        assert_eq!(
            s.trace_cost("p1", &["t1".to_string()], None),
            Some("0.6".parse().unwrap())
        );
    }

    #[test]
    fn test_cost_overflow_saturates() {
        let max = Decimal::MAX.to_string();
        let s = store(EventLog {
            traces: vec![trace("t1", "s1", Some("u"), 0)],
            observations: vec![
                observation("o1", "t1", &max, 0),
                observation("o2", "t1", &max, 0),
            ],
            ..Default::default()
        });
        let metrics = s.session_metrics(&SessionQuery::new("p1")).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].total_cost, Decimal::MAX);
        assert_eq!(
            s.trace_cost("p1", &["t1".to_string()], None),
            Some(Decimal::MAX)
        );
    }

    #[test]
    fn test_trace_cost_none_without_observations() {
        let s = store(EventLog::default());
        assert_eq!(s.trace_cost("p1", &["t1".to_string()], None), None);
    }

    #[test]
    fn test_pagination_matches_slice_of_full_listing() {
        let traces = (0..35)
            .map(|i| trace(&format!("t{}", i), &format!("s{:02}", i), Some("u"), i))
            .collect();
        let s = store(EventLog {
            traces,
            ..Default::default()
        });
        let full = s
            .list_sessions(&SessionQuery::new("p1").with_page(Some(0), Some(10_000_000)))
            .unwrap();
        let page = s
            .list_sessions(&SessionQuery::new("p1").with_page(Some(2), Some(10)))
            .unwrap();
        assert_eq!(full.len(), 35);
        assert_eq!(page, full[20..30].to_vec());
        assert_eq!(
            s.count_sessions(&SessionQuery::new("p1").with_page(Some(2), Some(10)))
                .unwrap(),
            35
        );
    }

    #[test]
    fn test_ties_ordered_by_session_id() {
        let s = store(EventLog {
            traces: vec![
                trace("t1", "b", Some("u"), 0),
                trace("t2", "a", Some("u"), 0),
                trace("t3", "c", Some("u"), 0),
            ],
            ..Default::default()
        });
        let ids: Vec<_> = s
            .list_sessions(&SessionQuery::new("p1"))
            .unwrap()
            .into_iter()
            .map(|r| r.session_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_allow_list_and_session_filters() {
        let s = store(EventLog {
            traces: vec![
                trace("t1", "s1", Some("alice"), 0),
                trace("t2", "s1", Some("alice"), 5),
                trace("t3", "s2", Some("bob"), 1),
            ],
            ..Default::default()
        });
        let allowed = SessionQuery::new("p1").with_allowed_user_ids(Some(vec!["bob".into()]));
        let rows = s.list_sessions(&allowed).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "s2");

        let empty = SessionQuery::new("p1").with_allowed_user_ids(Some(vec![]));
        assert!(s.list_sessions(&empty).unwrap().is_empty());

        let busy = SessionQuery::new("p1").with_filters(vec![Filter::Number {
            column: "countTraces".into(),
            operator: NumberOp::Gte,
            value: 2.0,
        }]);
        let rows = s.list_sessions(&busy).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "s1");
    }

    #[test]
    fn test_trace_filter_restricts_members() {
        let mut prod = trace("t1", "s1", Some("alice"), 0);
        prod.environment = "production".into();
        let s = store(EventLog {
            traces: vec![prod, trace("t2", "s1", Some("bob"), 1)],
            ..Default::default()
        });
        let query = SessionQuery::new("p1")
            .with_filters(vec![Filter::any_of("environment", vec!["production".into()])]);
        let rows = s.list_sessions(&query).unwrap();
        assert_eq!(rows[0].user_ids, vec!["alice".to_string()]);
        assert_eq!(rows[0].count_traces, 1);
    }

    #[test]
    fn test_session_id_filter_keeps_whole_sessions() {
        let s = store(EventLog {
            traces: vec![
                trace("t1", "s1", Some("alice"), 0),
                trace("t2", "s1", Some("bob"), 1),
                trace("t3", "s2", Some("carol"), 2),
            ],
            observations: vec![
                observation("o1", "t1", "0.25", 0),
                observation("o2", "t2", "0.5", 1),
                observation("o3", "t3", "1", 2),
            ],
            ..Default::default()
        });
        let only_s1 =
            SessionQuery::new("p1").with_filters(vec![Filter::any_of("id", vec!["s1".into()])]);
        let metrics = s.session_metrics(&only_s1).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].count_traces, 2);
        assert_eq!(metrics[0].user_ids, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(metrics[0].total_cost, "0.75".parse::<Decimal>().unwrap());

        let not_s1 =
            SessionQuery::new("p1").with_filters(vec![Filter::none_of("id", vec!["s1".into()])]);
        let rows = s.list_sessions(&not_s1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "s2");
    }

    #[test]
    fn test_order_by_total_cost() {
        let s = store(EventLog {
            traces: vec![trace("t1", "cheap", Some("u"), 0), trace("t2", "pricey", Some("u"), 1)],
            observations: vec![
                observation("o1", "t1", "0.01", 0),
                observation("o2", "t2", "2.5", 1),
            ],
            ..Default::default()
        });
        let query = SessionQuery::new("p1").with_order_by(Some(OrderBy {
            column: "totalCost".into(),
            direction: OrderDirection::Desc,
        }));
        let rows = s.list_sessions(&query).unwrap();
        assert_eq!(rows[0].session_id, "pricey");
    }

    #[test]
    fn test_relational_filter_rejected() {
        let s = store(EventLog::default());
        let query = SessionQuery::new("p1").with_filters(vec![Filter::Boolean {
            column: "bookmarked".into(),
            operator: crate::data::filters::BooleanOp::Eq,
            value: true,
        }]);
        assert!(matches!(s.list_sessions(&query), Err(MemoryError::Query(_))));
    }

    #[test]
    fn test_scores_dedup_bound_and_paging() {
        let mut v1 = score("sc1", "t1", "quality", 0.1, 10);
        v1.event_ts = ts(10);
        let mut v2 = score("sc1", "t1", "quality", 0.9, 10);
        v2.event_ts = ts(20);
        let s = store(EventLog {
            scores: vec![v1, v2, score("sc2", "t1", "latency", 3.0, 30), score("sc3", "t2", "x", 1.0, 0)],
            ..Default::default()
        });
        let query = ScoreQuery::new("p1", ScoreTarget::Traces(vec!["t1".into()]));
        let rows = s.scores(&query);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "sc2");
        assert_eq!(rows[1].value, Some(0.9));

        let bounded = query.clone().with_min_timestamp(Some(ts(15)));
        assert_eq!(s.scores(&bounded).len(), 1);

        let paged = query.with_limit(Some(1), Some(1));
        assert_eq!(s.scores(&paged)[0].id, "sc1");
    }

    #[test]
    fn test_options() {
        let mut tagged = trace("t1", "s1", Some("alice"), 0);
        tagged.tags = vec!["b".into(), "a".into()];
        let s = store(EventLog {
            traces: vec![
                tagged,
                trace("t2", "s2", Some("bob"), 1),
                trace("t3", "s3", Some("bob"), 2),
            ],
            scores: vec![score("sc1", "t1", "quality", 1.0, 0)],
            ..Default::default()
        });
        let users = s.user_options("p1", &[], 1000).unwrap();
        assert_eq!(users[0], FilterOptionRow { value: "bob".into(), count: 2 });
        assert_eq!(s.tag_options("p1", &[]).unwrap(), vec!["a", "b"]);
        let names = s.score_names("p1", ScoreDataType::Numeric, None);
        assert_eq!(names, vec![ScoreNameRow { name: "quality".into(), values: vec![] }]);
        assert!(s.has_any_session("p1"));
        assert!(!s.has_any_session("other"));
    }

    #[tokio::test]
    async fn test_init_from_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        let log = EventLog {
            traces: vec![trace("t1", "s1", Some("u"), 0)],
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string(&log).unwrap()).unwrap();

        let s = MemoryEventStore::init(Some(&path)).await.unwrap();
        assert_eq!(s.count_sessions(&SessionQuery::new("p1")).unwrap(), 1);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            MemoryEventStore::init(Some(&path)).await,
            Err(MemoryError::Fixture { .. })
        ));
    }
}
