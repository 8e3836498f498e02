//! Trace-level queries (ClickHouse backend)

use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::data::clickhouse::ClickhouseError;
use crate::data::clickhouse::query::{
    BuiltQuery, ParamValue, QueryParams, SqlBuilder, dedup_subquery, timestamp_param,
    translate_filters,
};
use crate::data::filters::{ColumnStage, Filter, FilterError};
use crate::data::types::{FilterOptionRow, TraceIdentifier};

use super::{millis_to_datetime, parse_decimal};

const TRACE_COLUMNS: &str = "id, session_id, user_id, name, environment, tags, timestamp";

// ============================================================================
// Session traces
// ============================================================================

#[derive(Row, Deserialize)]
struct ChTraceIdentifierRow {
    id: String,
    user_id: Option<String>,
    name: Option<String>,
    environment: String,
    timestamp_ms: i64,
}

pub fn build_trace_identifiers_query(project_id: &str, session_id: &str) -> BuiltQuery {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(project_id.to_string()));
    let session = params.push("sessionId", ParamValue::String(session_id.to_string()));
    SqlBuilder::new(params)
        .always(format!(
            "SELECT t.id AS id, t.user_id AS user_id, t.name AS name, t.environment AS environment, \
             toInt64(toUnixTimestamp64Milli(t.timestamp)) AS timestamp_ms\n\
             FROM ({}) t",
            dedup_subquery("traces", TRACE_COLUMNS, &project, &[])
        ))
        .always(format!("WHERE t.session_id = {}", session))
        .always("ORDER BY t.timestamp ASC, t.id ASC")
        .build()
}

pub async fn trace_identifiers_for_session(
    client: &Client,
    project_id: &str,
    session_id: &str,
) -> Result<Vec<TraceIdentifier>, ClickhouseError> {
    build_trace_identifiers_query(project_id, session_id)
        .fetch_all::<ChTraceIdentifierRow>(client, "trace_identifiers_for_session")
        .await?
        .into_iter()
        .map(|row| {
            Ok(TraceIdentifier {
                id: row.id,
                user_id: row.user_id,
                name: row.name,
                environment: row.environment,
                timestamp: millis_to_datetime("timestamp", row.timestamp_ms)?,
            })
        })
        .collect()
}

// ============================================================================
// Trace cost
// ============================================================================

#[derive(Row, Deserialize)]
struct ChTraceCostRow {
    total_cost: String,
    matched: u64,
}

/// Observation start times are bounded before deduplication
pub fn build_trace_cost_query(
    project_id: &str,
    trace_ids: &[String],
    min_timestamp: Option<DateTime<Utc>>,
) -> BuiltQuery {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(project_id.to_string()));
    let mut pre_dedup = Vec::new();
    if let Some(min) = min_timestamp {
        pre_dedup.push(format!(
            "start_time >= {}",
            timestamp_param(&mut params, "minTimestamp", min.timestamp_millis())
        ));
    }
    let traces = params.push("traceIds", ParamValue::StringArray(trace_ids.to_vec()));
    SqlBuilder::new(params)
        .always(format!(
            "SELECT toString(sum(o.cost_total)) AS total_cost, count() AS matched\nFROM ({}) o",
            dedup_subquery("observations", "id, trace_id, cost_total", &project, &pre_dedup)
        ))
        .always(format!("WHERE has({}, o.trace_id)", traces))
        .build()
}

pub async fn trace_cost(
    client: &Client,
    project_id: &str,
    trace_ids: &[String],
    min_timestamp: Option<DateTime<Utc>>,
) -> Result<Option<Decimal>, ClickhouseError> {
    if trace_ids.is_empty() {
        return Ok(None);
    }
    let row = build_trace_cost_query(project_id, trace_ids, min_timestamp)
        .fetch_one::<ChTraceCostRow>(client, "trace_cost")
        .await?;
    if row.matched == 0 {
        return Ok(None);
    }
    parse_decimal("cost_total", &row.total_cost).map(Some)
}

// ============================================================================
// Filter options
// ============================================================================

#[derive(Row, Deserialize)]
struct ChOptionRow {
    value: String,
    count: u64,
}

pub fn build_user_options_query(
    project_id: &str,
    filters: &[Filter],
    limit: u32,
) -> Result<BuiltQuery, FilterError> {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(project_id.to_string()));
    let conditions = translate_filters(filters, ColumnStage::Trace, "t", &mut params)?;
    Ok(SqlBuilder::new(params)
        .always(format!(
            "SELECT assumeNotNull(t.user_id) AS value, count() AS count\nFROM ({}) t",
            dedup_subquery("traces", TRACE_COLUMNS, &project, &[])
        ))
        .always("WHERE t.user_id IS NOT NULL AND t.user_id != ''")
        .when(!conditions.is_empty(), |_| {
            format!("AND {}", conditions.join("\nAND "))
        })
        .always("GROUP BY value\nORDER BY count DESC, value ASC")
        .always_with(|p| format!("LIMIT {}", p.push("limit", ParamValue::UInt32(limit))))
        .build())
}

pub async fn user_options(
    client: &Client,
    project_id: &str,
    filters: &[Filter],
    limit: u32,
) -> Result<Vec<FilterOptionRow>, ClickhouseError> {
    let rows = build_user_options_query(project_id, filters, limit)?
        .fetch_all::<ChOptionRow>(client, "user_options")
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| FilterOptionRow {
            value: row.value,
            count: row.count,
        })
        .collect())
}

pub fn build_tag_options_query(
    project_id: &str,
    filters: &[Filter],
) -> Result<BuiltQuery, FilterError> {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(project_id.to_string()));
    let conditions = translate_filters(filters, ColumnStage::Trace, "t", &mut params)?;
    Ok(SqlBuilder::new(params)
        .always(format!(
            "SELECT DISTINCT arrayJoin(t.tags) AS tag\nFROM ({}) t",
            dedup_subquery("traces", TRACE_COLUMNS, &project, &[])
        ))
        .when(!conditions.is_empty(), |_| {
            format!("WHERE {}", conditions.join("\nAND "))
        })
        .always("ORDER BY tag ASC")
        .build())
}

pub async fn tag_options(
    client: &Client,
    project_id: &str,
    filters: &[Filter],
) -> Result<Vec<String>, ClickhouseError> {
    build_tag_options_query(project_id, filters)?
        .fetch_all::<String>(client, "tag_options")
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::DatetimeOp;
    use chrono::TimeZone;

    #[test]
    fn test_trace_identifiers_query() {
        let q = build_trace_identifiers_query("p", "s1");
        assert!(q.sql.contains("WHERE t.session_id = {sessionId:String}"));
        assert!(q.sql.contains("ORDER BY t.timestamp ASC"));
        assert_eq!(q.params.names(), vec!["projectId", "sessionId"]);
    }

    #[test]
    fn test_trace_cost_query() {
        let min = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let q = build_trace_cost_query("p", &["t1".to_string()], Some(min));
        let bound = q.sql.find("start_time >= fromUnixTimestamp64Milli").unwrap();
        let dedup = q.sql.find("LIMIT 1 BY id, project_id").unwrap();
        let target = q.sql.find("WHERE has({traceIds:Array(String)}, o.trace_id)").unwrap();
        assert!(bound < dedup && dedup < target);
        assert!(q.sql.contains("count() AS matched"));
    }

    #[test]
    fn test_user_options_query() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filters = vec![Filter::Datetime {
            column: "timestamp".to_string(),
            operator: DatetimeOp::Gte,
            value: from,
        }];
        let q = build_user_options_query("p", &filters, 1000).unwrap();
        assert!(q.sql.contains("AND t.timestamp >= fromUnixTimestamp64Milli({filter1:Int64})"));
        assert!(q.sql.ends_with("LIMIT {limit:UInt32}"));
        assert_eq!(q.params.get("limit"), Some(&ParamValue::UInt32(1000)));
    }

    #[test]
    fn test_tag_options_query_without_filters() {
        let q = build_tag_options_query("p", &[]).unwrap();
        assert!(q.sql.contains("arrayJoin(t.tags)"));
        assert!(!q.sql.contains("WHERE t."));
    }
}
