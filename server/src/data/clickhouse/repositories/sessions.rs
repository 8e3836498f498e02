//! Session aggregation queries (ClickHouse backend)
//!
//! Sessions are never stored. They are derived per query from the
//! deduplicated traces of one project:
//!
//! ```text
//! deduplicated_traces -> filtered_traces -> [observation_totals] -> session_data -> final select
//! ```

use clickhouse::{Client, Row};
use serde::Deserialize;

use crate::data::clickhouse::ClickhouseError;
use crate::data::clickhouse::query::{
    BuiltQuery, ParamValue, QueryParams, SqlBuilder, dedup_subquery, translate_filters,
};
use crate::data::filters::{ColumnStage, FilterError, OrderBy, columns};
use crate::data::types::{SessionAggregateRow, SessionMetricsRow, SessionQuery};

use super::{millis_to_datetime, parse_decimal};

/// What the final SELECT returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Listing columns, ordered and paged
    Rows,
    /// Listing columns plus observation rollups, ordered and paged
    Metrics,
    /// Number of matching sessions
    Count,
}

const TRACE_COLUMNS: &str = "id, project_id, session_id, user_id, name, environment, tags, timestamp";
const OBSERVATION_COLUMNS: &str =
    "id, trace_id, usage_input, usage_output, usage_total, cost_input, cost_output, cost_total";

/// Build the session query, or `None` when the allow-list excludes everything.
pub fn build_session_query(
    query: &SessionQuery,
    projection: Projection,
) -> Result<Option<BuiltQuery>, FilterError> {
    if query.excludes_everything() {
        return Ok(None);
    }

    let order = query.order_by.clone().unwrap_or_else(OrderBy::created_at_desc);
    order.validate()?;
    let order_def = columns::resolve(&order.column)?;

    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(query.project_id.clone()));
    let trace_conditions = translate_filters(&query.filters, ColumnStage::Trace, "t", &mut params)?;
    let session_conditions =
        translate_filters(&query.filters, ColumnStage::Session, "s", &mut params)?;

    let with_observations = projection == Projection::Metrics
        || order_def.requires_observations
        || query.filters.iter().any(|f| {
            columns::lookup(f.column()).is_some_and(|def| def.requires_observations)
        });
    let ordered = projection != Projection::Count;
    let pagination = if ordered { query.pagination() } else { None };

    let dedup_traces = dedup_subquery("traces", TRACE_COLUMNS, &project, &[]);
    let dedup_observations = dedup_subquery("observations", OBSERVATION_COLUMNS, &project, &[]);

    let built = SqlBuilder::new(params)
        .always(format!(
            "WITH deduplicated_traces AS (\n    {}\n),",
            dedup_traces
        ))
        .always(
            "filtered_traces AS (\n    SELECT * FROM deduplicated_traces t\n    WHERE t.session_id IS NOT NULL AND t.session_id != ''",
        )
        .when(!trace_conditions.is_empty(), |_| {
            format!("    AND {}", trace_conditions.join("\n    AND "))
        })
        .always("),")
        .when(with_observations, move |_| {
            format!(
                r#"observation_totals AS (
    SELECT
        o.trace_id AS trace_id,
        count() AS observation_count,
        sum(o.usage_input) AS input_usage,
        sum(o.usage_output) AS output_usage,
        sum(o.usage_total) AS total_usage,
        sum(o.cost_input) AS input_cost,
        sum(o.cost_output) AS output_cost,
        sum(o.cost_total) AS total_cost
    FROM ({}) o
    WHERE o.trace_id IN (SELECT id FROM filtered_traces)
    GROUP BY o.trace_id
),"#,
                dedup_observations
            )
        })
        .always(
            r#"session_data AS (
    SELECT
        assumeNotNull(t.session_id) AS session_id,
        arraySort(groupUniqArrayIf(assumeNotNull(t.user_id), t.user_id IS NOT NULL AND t.user_id != '')) AS user_ids,
        min(t.timestamp) AS min_timestamp,
        max(t.timestamp) AS max_timestamp,
        count() AS trace_count,
        arraySort(groupUniqArrayArray(t.tags)) AS trace_tags,
        argMax(t.environment, t.timestamp) AS environment,
        toInt64(dateDiff('second', min(t.timestamp), max(t.timestamp))) AS duration"#,
        )
        .when(with_observations, |_| {
            r#"        ,
        toUInt64(sum(ot.observation_count)) AS total_observations,
        sum(ot.input_cost) AS session_input_cost,
        sum(ot.output_cost) AS session_output_cost,
        sum(ot.total_cost) AS session_total_cost,
        toInt64(sum(ot.input_usage)) AS session_input_usage,
        toInt64(sum(ot.output_usage)) AS session_output_usage,
        toInt64(sum(ot.total_usage)) AS session_total_usage"#
                .to_string()
        })
        .always("    FROM filtered_traces t")
        .when(with_observations, |_| {
            "    LEFT JOIN observation_totals ot ON ot.trace_id = t.id".to_string()
        })
        .always("    GROUP BY t.session_id\n)")
        .always(match projection {
            Projection::Count => "SELECT count() AS total".to_string(),
            Projection::Rows => r#"SELECT
    s.session_id AS session_id,
    s.user_ids AS user_ids,
    toInt64(toUnixTimestamp64Milli(s.min_timestamp)) AS created_at_ms,
    s.trace_count AS trace_count,
    s.trace_tags AS trace_tags,
    s.environment AS environment"#
                .to_string(),
            Projection::Metrics => r#"SELECT
    s.session_id AS session_id,
    s.user_ids AS user_ids,
    toInt64(toUnixTimestamp64Milli(s.min_timestamp)) AS created_at_ms,
    s.trace_count AS trace_count,
    s.trace_tags AS trace_tags,
    s.environment AS environment,
    s.total_observations AS total_observations,
    s.duration AS duration,
    toString(s.session_input_cost) AS input_cost,
    toString(s.session_output_cost) AS output_cost,
    toString(s.session_total_cost) AS total_cost,
    s.session_input_usage AS session_input_usage,
    s.session_output_usage AS session_output_usage,
    s.session_total_usage AS session_total_usage"#
                .to_string(),
        })
        .always("FROM session_data s\nWHERE length(s.user_ids) > 0")
        .when(query.allowed_user_ids.is_some(), |p| {
            let allowed = query.allowed_user_ids.clone().unwrap_or_default();
            format!(
                "AND hasAny(s.user_ids, {})",
                p.push("allowedUserIds", ParamValue::StringArray(allowed))
            )
        })
        .when(!session_conditions.is_empty(), |_| {
            format!("AND {}", session_conditions.join("\nAND "))
        })
        .when(ordered, |_| {
            format!(
                "ORDER BY s.{} {}, s.session_id ASC",
                order_def.physical,
                order.direction.as_sql()
            )
        })
        .when(pagination.is_some(), |p| {
            let (limit, offset) = pagination.unwrap_or_default();
            format!(
                "LIMIT {} OFFSET {}",
                p.push("limit", ParamValue::UInt32(limit)),
                p.push("offset", ParamValue::UInt64(offset))
            )
        })
        .build();

    Ok(Some(built))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Row, Deserialize)]
struct ChSessionRow {
    session_id: String,
    user_ids: Vec<String>,
    created_at_ms: i64,
    trace_count: u64,
    trace_tags: Vec<String>,
    environment: String,
}

#[derive(Row, Deserialize)]
struct ChSessionMetricsRow {
    session_id: String,
    user_ids: Vec<String>,
    created_at_ms: i64,
    trace_count: u64,
    trace_tags: Vec<String>,
    environment: String,
    total_observations: u64,
    duration: i64,
    input_cost: String,
    output_cost: String,
    total_cost: String,
    session_input_usage: i64,
    session_output_usage: i64,
    session_total_usage: i64,
}

impl TryFrom<ChSessionRow> for SessionAggregateRow {
    type Error = ClickhouseError;

    fn try_from(row: ChSessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: row.session_id,
            user_ids: row.user_ids,
            created_at: millis_to_datetime("min_timestamp", row.created_at_ms)?,
            count_traces: row.trace_count,
            trace_tags: row.trace_tags,
            environment: row.environment,
        })
    }
}

impl TryFrom<ChSessionMetricsRow> for SessionMetricsRow {
    type Error = ClickhouseError;

    fn try_from(row: ChSessionMetricsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: row.session_id,
            user_ids: row.user_ids,
            created_at: millis_to_datetime("min_timestamp", row.created_at_ms)?,
            count_traces: row.trace_count,
            trace_tags: row.trace_tags,
            environment: row.environment,
            total_observations: row.total_observations,
            session_duration: row.duration,
            input_cost: parse_decimal("session_input_cost", &row.input_cost)?,
            output_cost: parse_decimal("session_output_cost", &row.output_cost)?,
            total_cost: parse_decimal("session_total_cost", &row.total_cost)?,
            input_tokens: row.session_input_usage,
            output_tokens: row.session_output_usage,
            total_tokens: row.session_total_usage,
        })
    }
}

// ============================================================================
// Queries
// ============================================================================

pub async fn list_sessions(
    client: &Client,
    query: &SessionQuery,
) -> Result<Vec<SessionAggregateRow>, ClickhouseError> {
    let Some(built) = build_session_query(query, Projection::Rows)? else {
        return Ok(Vec::new());
    };
    built
        .fetch_all::<ChSessionRow>(client, "list_sessions")
        .await?
        .into_iter()
        .map(SessionAggregateRow::try_from)
        .collect()
}

pub async fn count_sessions(client: &Client, query: &SessionQuery) -> Result<u64, ClickhouseError> {
    let Some(built) = build_session_query(query, Projection::Count)? else {
        return Ok(0);
    };
    built.fetch_one::<u64>(client, "count_sessions").await
}

pub async fn session_metrics(
    client: &Client,
    query: &SessionQuery,
) -> Result<Vec<SessionMetricsRow>, ClickhouseError> {
    let Some(built) = build_session_query(query, Projection::Metrics)? else {
        return Ok(Vec::new());
    };
    built
        .fetch_all::<ChSessionMetricsRow>(client, "session_metrics")
        .await?
        .into_iter()
        .map(SessionMetricsRow::try_from)
        .collect()
}

pub fn build_has_any_session_query(project_id: &str) -> BuiltQuery {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(project_id.to_string()));
    SqlBuilder::new(params)
        .always(format!(
            "SELECT count() > 0 FROM ({}) t",
            dedup_subquery("traces", "id, session_id", &project, &[])
        ))
        .always("WHERE t.session_id IS NOT NULL AND t.session_id != ''")
        .build()
}

pub async fn has_any_session(client: &Client, project_id: &str) -> Result<bool, ClickhouseError> {
    build_has_any_session_query(project_id)
        .fetch_one::<bool>(client, "has_any_session")
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::{Filter, NumberOp, OrderDirection};

    fn built(query: &SessionQuery, projection: Projection) -> BuiltQuery {
        build_session_query(query, projection).unwrap().unwrap()
    }

    #[test]
    fn test_empty_allow_list_builds_nothing() {
        let query = SessionQuery::new("p").with_allowed_user_ids(Some(vec![]));
        assert!(build_session_query(&query, Projection::Rows).unwrap().is_none());
        assert!(build_session_query(&query, Projection::Count).unwrap().is_none());
    }

    #[test]
    fn test_rows_query_dedups_before_grouping() {
        let q = built(&SessionQuery::new("p"), Projection::Rows);
        let dedup = q
            .sql
            .find("LIMIT 1 BY id, project_id")
            .expect("dedup clause");
        let group = q.sql.find("GROUP BY t.session_id").expect("grouping");
        assert!(dedup < group);
        assert!(q.sql.contains("WHERE length(s.user_ids) > 0"));
        assert!(q.sql.contains("ORDER BY s.min_timestamp DESC, s.session_id ASC"));
        assert!(!q.sql.contains("observation_totals"));
        assert!(!q.sql.contains("LIMIT {limit"));
        assert_eq!(q.params.names(), vec!["projectId"]);
    }

    #[test]
    fn test_user_values_are_never_inlined() {
        let query = SessionQuery::new("proj'; DROP TABLE traces; --")
            .with_filters(vec![Filter::any_of(
                "environment",
                vec!["prod'--".to_string()],
            )])
            .with_allowed_user_ids(Some(vec!["u'1".to_string()]));
        let q = built(&query, Projection::Rows);
        assert!(!q.sql.contains("DROP TABLE"));
        assert!(!q.sql.contains("prod'--"));
        assert!(!q.sql.contains("u'1"));
        assert!(q.sql.contains("hasAny(s.user_ids, {allowedUserIds:Array(String)})"));
        assert!(q.sql.contains("has({filter1:Array(String)}, t.environment)"));
        assert_eq!(
            q.params.names(),
            vec!["projectId", "filter1", "allowedUserIds"]
        );
    }

    #[test]
    fn test_pagination_params() {
        let query = SessionQuery::new("p").with_page(Some(2), Some(10));
        let q = built(&query, Projection::Rows);
        assert!(q.sql.ends_with("LIMIT {limit:UInt32} OFFSET {offset:UInt64}"));
        assert_eq!(q.params.get("limit"), Some(&ParamValue::UInt32(10)));
        assert_eq!(q.params.get("offset"), Some(&ParamValue::UInt64(20)));
    }

    #[test]
    fn test_count_has_no_order_or_limit() {
        let query = SessionQuery::new("p").with_page(Some(1), Some(10));
        let q = built(&query, Projection::Count);
        assert!(q.sql.contains("SELECT count() AS total"));
        assert!(!q.sql.contains("ORDER BY s."));
        assert!(q.params.get("limit").is_none());
    }

    #[test]
    fn test_cost_ordering_joins_observations() {
        let query = SessionQuery::new("p").with_order_by(Some(OrderBy {
            column: "totalCost".to_string(),
            direction: OrderDirection::Asc,
        }));
        let q = built(&query, Projection::Rows);
        assert!(q.sql.contains("observation_totals AS ("));
        assert!(q.sql.contains("LEFT JOIN observation_totals ot ON ot.trace_id = t.id"));
        assert!(q.sql.contains("ORDER BY s.session_total_cost ASC, s.session_id ASC"));
    }

    #[test]
    fn test_metrics_selects_decimals_as_strings() {
        let query = SessionQuery::new("p").with_filters(vec![
            Filter::any_of("id", vec!["s1".to_string()]),
            Filter::Number {
                column: "countTraces".to_string(),
                operator: NumberOp::Gte,
                value: 2.0,
            },
        ]);
        let q = built(&query, Projection::Metrics);
        assert!(q.sql.contains("toString(s.session_total_cost) AS total_cost"));
        assert!(q.sql.contains("AND s.trace_count >= {filter2:Float64}"));

        // session ids prune the traces before observations are joined in
        let session_filter = q
            .sql
            .find("AND has({filter1:Array(String)}, t.session_id)")
            .expect("session id predicate on traces");
        let filtered = q.sql.find("filtered_traces AS (").expect("filtered traces");
        let observations = q.sql.find("observation_totals AS (").expect("observation rollup");
        assert!(filtered < session_filter && session_filter < observations);
        assert!(!q.sql.contains("s.session_id)"));
    }

    #[test]
    fn test_unsortable_order_rejected() {
        let query = SessionQuery::new("p").with_order_by(Some(OrderBy {
            column: "userIds".to_string(),
            direction: OrderDirection::Asc,
        }));
        assert_eq!(
            build_session_query(&query, Projection::Rows).unwrap_err(),
            FilterError::NotSortable("userIds".to_string())
        );
    }

    #[test]
    fn test_has_any_session_query() {
        let q = build_has_any_session_query("p");
        assert!(q.sql.contains("LIMIT 1 BY id, project_id"));
        assert!(q.sql.contains("t.session_id != ''"));
        assert_eq!(q.params.names(), vec!["projectId"]);
    }
}
