//! In-process evaluation of the session pipeline
//!
//! Mirrors the ClickHouse query plan step by step: deduplicate, apply
//! trace-stage filters, group by session, require at least one user id,
//! apply the allow-list and session-stage filters, then sort.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::data::filters::{
    ArrayOptionsOp, ColumnStage, DatetimeOp, Filter, FilterError, NullOp, NumberOp,
    OptionsOp, OrderBy, OrderDirection, StringOp, columns,
};
use crate::data::types::{
    ObservationEventRow, SessionAggregateRow, SessionMetricsRow, SessionQuery, TraceEventRow,
};

// ============================================================================
// Deduplication
// ============================================================================

/// Latest version per key. Equal version timestamps keep the first row seen.
///
/// Output preserves the order in which keys were first seen.
pub(super) fn latest<'a, T, K, V>(
    rows: impl IntoIterator<Item = &'a T>,
    key: impl Fn(&T) -> K,
    version: impl Fn(&T) -> V,
) -> Vec<&'a T>
where
    T: 'a,
    K: std::hash::Hash + Eq,
    V: PartialOrd,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut kept: Vec<&'a T> = Vec::new();
    for row in rows {
        match index.get(&key(row)) {
            Some(&i) => {
                if version(row) > version(kept[i]) {
                    kept[i] = row;
                }
            }
            None => {
                index.insert(key(row), kept.len());
                kept.push(row);
            }
        }
    }
    kept
}

pub(super) fn latest_traces<'a>(
    traces: &'a [TraceEventRow],
    project_id: &str,
) -> Vec<&'a TraceEventRow> {
    latest(
        traces.iter().filter(|t| t.project_id == project_id),
        |t| (t.id.clone(), t.project_id.clone()),
        |t| t.event_ts,
    )
}

pub(super) fn latest_observations<'a>(
    observations: &'a [ObservationEventRow],
    project_id: &str,
    min_start: Option<DateTime<Utc>>,
) -> Vec<&'a ObservationEventRow> {
    latest(
        observations
            .iter()
            .filter(|o| o.project_id == project_id)
            .filter(|o| min_start.is_none_or(|min| o.start_time >= min)),
        |o| (o.id.clone(), o.project_id.clone()),
        |o| o.event_ts,
    )
}

// ============================================================================
// Field access
// ============================================================================

/// A column value as seen by filter evaluation
#[derive(Debug, Clone, Copy)]
pub(super) enum FieldValue<'a> {
    Str(Option<&'a str>),
    Strs(&'a [String]),
    Number(f64),
    Decimal(Decimal),
    Time(DateTime<Utc>),
}

fn trace_field<'a>(trace: &'a TraceEventRow, physical: &str) -> Option<FieldValue<'a>> {
    Some(match physical {
        "session_id" => FieldValue::Str(trace.session_id.as_deref()),
        "user_id" => FieldValue::Str(trace.user_id.as_deref()),
        "environment" => FieldValue::Str(Some(&trace.environment)),
        "timestamp" => FieldValue::Time(trace.timestamp),
        "name" => FieldValue::Str(trace.name.as_deref()),
        _ => return None,
    })
}

/// Aggregated session, carrying every session-stage column
#[derive(Debug, Clone, PartialEq)]
pub(super) struct SessionRecord {
    pub session_id: String,
    pub user_ids: Vec<String>,
    pub min_timestamp: DateTime<Utc>,
    pub max_timestamp: DateTime<Utc>,
    pub trace_count: u64,
    pub trace_tags: Vec<String>,
    pub environment: String,
    pub total_observations: u64,
    pub input_cost: Decimal,
    pub output_cost: Decimal,
    pub total_cost: Decimal,
    pub input_usage: i64,
    pub output_usage: i64,
    pub total_usage: i64,
}

impl SessionRecord {
    fn duration(&self) -> i64 {
        (self.max_timestamp - self.min_timestamp).num_seconds()
    }

    fn field(&self, physical: &str) -> Option<FieldValue<'_>> {
        Some(match physical {
            "session_id" => FieldValue::Str(Some(&self.session_id)),
            "user_ids" => FieldValue::Strs(&self.user_ids),
            "min_timestamp" => FieldValue::Time(self.min_timestamp),
            "trace_count" => FieldValue::Number(self.trace_count as f64),
            "trace_tags" => FieldValue::Strs(&self.trace_tags),
            "duration" => FieldValue::Number(self.duration() as f64),
            "total_observations" => FieldValue::Number(self.total_observations as f64),
            "session_input_cost" => FieldValue::Decimal(self.input_cost),
            "session_output_cost" => FieldValue::Decimal(self.output_cost),
            "session_total_cost" => FieldValue::Decimal(self.total_cost),
            "session_input_usage" => FieldValue::Number(self.input_usage as f64),
            "session_output_usage" => FieldValue::Number(self.output_usage as f64),
            "session_total_usage" => FieldValue::Number(self.total_usage as f64),
            _ => return None,
        })
    }

    pub fn to_aggregate(&self) -> SessionAggregateRow {
        SessionAggregateRow {
            session_id: self.session_id.clone(),
            user_ids: self.user_ids.clone(),
            created_at: self.min_timestamp,
            count_traces: self.trace_count,
            trace_tags: self.trace_tags.clone(),
            environment: self.environment.clone(),
        }
    }

    pub fn to_metrics(&self) -> SessionMetricsRow {
        SessionMetricsRow {
            session_id: self.session_id.clone(),
            user_ids: self.user_ids.clone(),
            created_at: self.min_timestamp,
            count_traces: self.trace_count,
            trace_tags: self.trace_tags.clone(),
            environment: self.environment.clone(),
            total_observations: self.total_observations,
            session_duration: self.duration(),
            input_cost: self.input_cost,
            output_cost: self.output_cost,
            total_cost: self.total_cost,
            input_tokens: self.input_usage,
            output_tokens: self.output_usage,
            total_tokens: self.total_usage,
        }
    }
}

// ============================================================================
// Filter evaluation
// ============================================================================

/// Filters of one stage, validated. Relational columns are rejected.
pub(super) fn stage_filters(
    filters: &[Filter],
    stage: ColumnStage,
) -> Result<Vec<(&Filter, &'static str)>, FilterError> {
    let mut selected = Vec::new();
    for filter in filters {
        filter.validate()?;
        let def = columns::resolve(filter.column())?;
        if def.stage == ColumnStage::Relational {
            return Err(FilterError::Unresolved(def.id.to_string()));
        }
        if def.stage == stage {
            selected.push((filter, def.physical));
        }
    }
    Ok(selected)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn compare_number(op: NumberOp, lhs: f64, rhs: f64) -> bool {
    match op {
        NumberOp::Eq => lhs == rhs,
        NumberOp::Gt => lhs > rhs,
        NumberOp::Lt => lhs < rhs,
        NumberOp::Gte => lhs >= rhs,
        NumberOp::Lte => lhs <= rhs,
    }
}

/// SQL semantics: comparisons against a missing value are false
pub(super) fn matches(filter: &Filter, value: FieldValue<'_>) -> bool {
    match (filter, value) {
        (Filter::Datetime { operator, value, .. }, FieldValue::Time(actual)) => match operator {
            DatetimeOp::Gt => actual > *value,
            DatetimeOp::Lt => actual < *value,
            DatetimeOp::Gte => actual >= *value,
            DatetimeOp::Lte => actual <= *value,
        },
        (Filter::String { operator, value, .. }, FieldValue::Str(actual)) => {
            let Some(actual) = actual else {
                return false;
            };
            match operator {
                StringOp::Eq => actual == value,
                StringOp::Contains => contains_ci(actual, value),
                StringOp::StartsWith => actual.to_lowercase().starts_with(&value.to_lowercase()),
                StringOp::EndsWith => actual.to_lowercase().ends_with(&value.to_lowercase()),
            }
        }
        (Filter::Number { operator, value, .. }, FieldValue::Number(actual)) => {
            compare_number(*operator, actual, *value)
        }
        (Filter::Number { operator, value, .. }, FieldValue::Decimal(actual)) => {
            compare_number(*operator, actual.to_f64().unwrap_or(0.0), *value)
        }
        (Filter::StringOptions { operator, value, .. }, FieldValue::Str(actual)) => {
            if value.is_empty() {
                return true;
            }
            let found = actual.is_some_and(|a| value.iter().any(|v| v == a));
            match operator {
                OptionsOp::AnyOf => found,
                OptionsOp::NoneOf => !found,
            }
        }
        (Filter::ArrayOptions { operator, value, .. }, FieldValue::Strs(actual)) => {
            if value.is_empty() {
                return true;
            }
            match operator {
                ArrayOptionsOp::AnyOf => value.iter().any(|v| actual.contains(v)),
                ArrayOptionsOp::AllOf => value.iter().all(|v| actual.contains(v)),
                ArrayOptionsOp::NoneOf => !value.iter().any(|v| actual.contains(v)),
            }
        }
        (Filter::Null { operator, .. }, FieldValue::Str(actual)) => match operator {
            NullOp::IsNull => actual.is_none(),
            NullOp::IsNotNull => actual.is_some(),
        },
        _ => false,
    }
}

pub(super) fn trace_matches(trace: &TraceEventRow, filters: &[(&Filter, &'static str)]) -> bool {
    filters.iter().all(|(filter, physical)| {
        trace_field(trace, physical).is_some_and(|value| matches(filter, value))
    })
}

fn session_matches(record: &SessionRecord, filters: &[(&Filter, &'static str)]) -> bool {
    filters.iter().all(|(filter, physical)| {
        record
            .field(physical)
            .is_some_and(|value| matches(filter, value))
    })
}

// ============================================================================
// Session pipeline
// ============================================================================

#[derive(Default)]
struct ObservationTotals {
    count: u64,
    input_cost: Decimal,
    output_cost: Decimal,
    total_cost: Decimal,
    input_usage: i64,
    output_usage: i64,
    total_usage: i64,
}

/// Sums saturate at the numeric bounds; malformed rows must not abort a query.
impl ObservationTotals {
    fn add_observation(&mut self, obs: &ObservationEventRow) {
        self.count = self.count.saturating_add(1);
        self.input_cost = self.input_cost.saturating_add(obs.cost_input);
        self.output_cost = self.output_cost.saturating_add(obs.cost_output);
        self.total_cost = self.total_cost.saturating_add(obs.cost_total);
        self.input_usage = self.input_usage.saturating_add(obs.usage_input);
        self.output_usage = self.output_usage.saturating_add(obs.usage_output);
        self.total_usage = self.total_usage.saturating_add(obs.usage_total);
    }

    fn merge(&mut self, other: &ObservationTotals) {
        self.count = self.count.saturating_add(other.count);
        self.input_cost = self.input_cost.saturating_add(other.input_cost);
        self.output_cost = self.output_cost.saturating_add(other.output_cost);
        self.total_cost = self.total_cost.saturating_add(other.total_cost);
        self.input_usage = self.input_usage.saturating_add(other.input_usage);
        self.output_usage = self.output_usage.saturating_add(other.output_usage);
        self.total_usage = self.total_usage.saturating_add(other.total_usage);
    }
}

fn group_sessions(
    traces: &[&TraceEventRow],
    observations: &[&ObservationEventRow],
) -> Vec<SessionRecord> {
    let mut totals: HashMap<&str, ObservationTotals> = HashMap::new();
    for obs in observations {
        totals
            .entry(obs.trace_id.as_str())
            .or_default()
            .add_observation(obs);
    }

    let mut grouped: BTreeMap<&str, Vec<&TraceEventRow>> = BTreeMap::new();
    for trace in traces {
        if let Some(session_id) = trace.session_id.as_deref().filter(|s| !s.is_empty()) {
            grouped.entry(session_id).or_default().push(trace);
        }
    }

    grouped
        .into_iter()
        .filter_map(|(session_id, members)| {
            let first = members.first()?;
            let mut user_ids = BTreeSet::new();
            let mut tags = BTreeSet::new();
            let mut min_ts = first.timestamp;
            let mut max_ts = first.timestamp;
            let mut latest = *first;
            let mut record_totals = ObservationTotals::default();
            for trace in &members {
                if let Some(user) = trace.user_id.as_deref().filter(|u| !u.is_empty()) {
                    user_ids.insert(user.to_string());
                }
                tags.extend(trace.tags.iter().cloned());
                min_ts = min_ts.min(trace.timestamp);
                if trace.timestamp >= max_ts {
                    max_ts = trace.timestamp;
                    latest = trace;
                }
                if let Some(t) = totals.get(trace.id.as_str()) {
                    record_totals.merge(t);
                }
            }
            Some(SessionRecord {
                session_id: session_id.to_string(),
                user_ids: user_ids.into_iter().collect(),
                min_timestamp: min_ts,
                max_timestamp: max_ts,
                trace_count: members.len() as u64,
                trace_tags: tags.into_iter().collect(),
                environment: latest.environment.clone(),
                total_observations: record_totals.count,
                input_cost: record_totals.input_cost,
                output_cost: record_totals.output_cost,
                total_cost: record_totals.total_cost,
                input_usage: record_totals.input_usage,
                output_usage: record_totals.output_usage,
                total_usage: record_totals.total_usage,
            })
        })
        .collect()
}

fn compare_records(a: &SessionRecord, b: &SessionRecord, physical: &str) -> Ordering {
    match (a.field(physical), b.field(physical)) {
        (Some(FieldValue::Str(x)), Some(FieldValue::Str(y))) => x.cmp(&y),
        (Some(FieldValue::Number(x)), Some(FieldValue::Number(y))) => {
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(FieldValue::Decimal(x)), Some(FieldValue::Decimal(y))) => x.cmp(&y),
        (Some(FieldValue::Time(x)), Some(FieldValue::Time(y))) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

/// All matching sessions in final order, before paging
pub(super) fn sessions(
    traces: &[TraceEventRow],
    observations: &[ObservationEventRow],
    query: &SessionQuery,
) -> Result<Vec<SessionRecord>, FilterError> {
    let order = query
        .order_by
        .clone()
        .unwrap_or_else(OrderBy::created_at_desc);
    order.validate()?;
    let order_def = columns::resolve(&order.column)?;
    let trace_filters = stage_filters(&query.filters, ColumnStage::Trace)?;
    let session_filters = stage_filters(&query.filters, ColumnStage::Session)?;

    if query.excludes_everything() {
        return Ok(Vec::new());
    }

    let members: Vec<&TraceEventRow> = latest_traces(traces, &query.project_id)
        .into_iter()
        .filter(|t| trace_matches(t, &trace_filters))
        .collect();
    let observations = latest_observations(observations, &query.project_id, None);

    let mut records: Vec<SessionRecord> = group_sessions(&members, &observations)
        .into_iter()
        .filter(|r| !r.user_ids.is_empty())
        .filter(|r| match &query.allowed_user_ids {
            Some(allowed) => r.user_ids.iter().any(|u| allowed.contains(u)),
            None => true,
        })
        .filter(|r| session_matches(r, &session_filters))
        .collect();

    records.sort_by(|a, b| {
        let primary = compare_records(a, b, order_def.physical);
        let primary = match order.direction {
            OrderDirection::Asc => primary,
            OrderDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.session_id.cmp(&b.session_id))
    });

    Ok(records)
}

/// Apply `LIMIT limit OFFSET limit * page` when both are present
pub(super) fn page<T>(rows: Vec<T>, query: &SessionQuery) -> Vec<T> {
    match query.pagination() {
        Some((limit, offset)) => rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect(),
        None => rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[derive(Debug, PartialEq)]
    struct Version {
        id: &'static str,
        v: i64,
        tag: &'static str,
    }

    #[test]
    fn test_latest_keeps_max_version_and_first_on_tie() {
        let rows = vec![
            Version { id: "a", v: 1, tag: "a1" },
            Version { id: "b", v: 5, tag: "b1" },
            Version { id: "a", v: 3, tag: "a2" },
            Version { id: "b", v: 5, tag: "b2" },
            Version { id: "a", v: 2, tag: "a3" },
        ];
        let kept = latest(&rows, |r| r.id, |r| r.v);
        let tags: Vec<_> = kept.iter().map(|r| r.tag).collect();
        assert_eq!(tags, vec!["a2", "b1"]);
    }

    #[test]
    fn test_matches_string_case_insensitive() {
        let filter = Filter::String {
            column: "traceName".into(),
            operator: StringOp::Contains,
            value: "CHAT".into(),
        };
        assert!(matches(&filter, FieldValue::Str(Some("my-chat-flow"))));
        assert!(!matches(&filter, FieldValue::Str(None)));
    }

    #[test]
    fn test_matches_options_on_missing_value() {
        let any = Filter::any_of("userId", vec!["u1".into()]);
        let none = Filter::none_of("userId", vec!["u1".into()]);
        assert!(!matches(&any, FieldValue::Str(None)));
        assert!(matches(&none, FieldValue::Str(None)));
        assert!(matches(&any, FieldValue::Str(Some("u1"))));
    }

    #[test]
    fn test_matches_array_options() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let all_of = Filter::ArrayOptions {
            column: "traceTags".into(),
            operator: ArrayOptionsOp::AllOf,
            value: vec!["a".into(), "c".into()],
        };
        let none_of = Filter::ArrayOptions {
            column: "traceTags".into(),
            operator: ArrayOptionsOp::NoneOf,
            value: vec!["c".into()],
        };
        assert!(!matches(&all_of, FieldValue::Strs(&tags)));
        assert!(matches(&none_of, FieldValue::Strs(&tags)));
    }

    #[test]
    fn test_matches_decimal_number() {
        let filter = Filter::Number {
            column: "totalCost".into(),
            operator: NumberOp::Gt,
            value: 0.5,
        };
        assert!(matches(&filter, FieldValue::Decimal(Decimal::new(6, 1))));
        assert!(!matches(&filter, FieldValue::Decimal(Decimal::new(4, 1))));
    }

    #[test]
    fn test_group_environment_from_latest_trace() {
        let make = |id: &str, secs: i64, env: &str| TraceEventRow {
            id: id.into(),
            project_id: "p".into(),
            session_id: Some("s".into()),
            user_id: Some("u".into()),
            name: None,
            environment: env.into(),
            tags: vec![],
            timestamp: ts(secs),
            event_ts: ts(secs),
        };
        let a = make("t1", 10, "staging");
        let b = make("t2", 20, "production");
        let records = group_sessions(&[&a, &b], &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].environment, "production");
        assert_eq!(records[0].duration(), 10);
        assert_eq!(records[0].trace_count, 2);
    }

    #[test]
    fn test_group_saturates_instead_of_overflowing() {
        let trace = TraceEventRow {
            id: "t1".into(),
            project_id: "p".into(),
            session_id: Some("s".into()),
            user_id: Some("u".into()),
            name: None,
            environment: "default".into(),
            tags: vec![],
            timestamp: ts(10),
            event_ts: ts(10),
        };
        let huge = |id: &str| ObservationEventRow {
            id: id.into(),
            trace_id: "t1".into(),
            project_id: "p".into(),
            start_time: ts(10),
            end_time: None,
            usage_input: i64::MAX,
            usage_output: i64::MAX,
            usage_total: i64::MAX,
            cost_input: Decimal::MAX,
            cost_output: Decimal::MAX,
            cost_total: Decimal::MAX,
            event_ts: ts(10),
        };
        let (a, b) = (huge("o1"), huge("o2"));
        let records = group_sessions(&[&trace], &[&a, &b]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_observations, 2);
        assert_eq!(records[0].total_cost, Decimal::MAX);
        assert_eq!(records[0].total_usage, i64::MAX);
    }
}
