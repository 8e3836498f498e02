//! Score queries (ClickHouse backend)

use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;

use crate::data::clickhouse::ClickhouseError;
use crate::data::clickhouse::query::{
    BuiltQuery, ParamValue, QueryParams, SqlBuilder, dedup_subquery, timestamp_param,
};
use crate::data::types::{RawScoreRow, ScoreDataType, ScoreNameRow, ScoreQuery, ScoreTarget};

use super::millis_to_datetime;

const SCORE_COLUMNS: &str = "id, project_id, trace_id, session_id, observation_id, name, value, string_value, data_type, source, comment, timestamp";

#[derive(Row, Deserialize)]
struct ChScoreRow {
    id: String,
    project_id: String,
    trace_id: Option<String>,
    session_id: Option<String>,
    observation_id: Option<String>,
    name: String,
    value: Option<f64>,
    string_value: Option<String>,
    data_type: String,
    source: String,
    comment: Option<String>,
    timestamp_ms: i64,
}

impl TryFrom<ChScoreRow> for RawScoreRow {
    type Error = ClickhouseError;

    fn try_from(row: ChScoreRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            trace_id: row.trace_id,
            session_id: row.session_id,
            observation_id: row.observation_id,
            name: row.name,
            value: row.value,
            string_value: row.string_value,
            data_type: row.data_type,
            source: row.source,
            comment: row.comment,
            timestamp: millis_to_datetime("timestamp", row.timestamp_ms)?,
        })
    }
}

/// The timestamp bound is applied before deduplication; a score's
/// timestamp does not change between versions.
pub fn build_scores_query(query: &ScoreQuery) -> BuiltQuery {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(query.project_id.clone()));
    let mut pre_dedup = Vec::new();
    if let Some(min) = query.min_timestamp {
        pre_dedup.push(format!(
            "timestamp >= {}",
            timestamp_param(&mut params, "minTimestamp", min.timestamp_millis())
        ));
    }
    let target_column = match query.target {
        ScoreTarget::Traces(_) => "trace_id",
        ScoreTarget::Sessions(_) => "session_id",
    };
    let targets = params.push(
        "targetIds",
        ParamValue::StringArray(query.target.ids().to_vec()),
    );
    let dedup = dedup_subquery("scores", SCORE_COLUMNS, &project, &pre_dedup);

    SqlBuilder::new(params)
        .always(format!(
            "SELECT id, project_id, trace_id, session_id, observation_id, name, value, string_value, \
             data_type, source, comment, toInt64(toUnixTimestamp64Milli(timestamp)) AS timestamp_ms\n\
             FROM ({}) s",
            dedup
        ))
        .always(format!("WHERE has({}, s.{})", targets, target_column))
        .always("ORDER BY s.timestamp DESC, s.id ASC")
        .when(query.limit.is_some(), |p| {
            format!(
                "LIMIT {} OFFSET {}",
                p.push("limit", ParamValue::UInt32(query.limit.unwrap_or_default())),
                p.push("offset", ParamValue::UInt64(query.offset.unwrap_or_default()))
            )
        })
        .build()
}

pub async fn scores(client: &Client, query: &ScoreQuery) -> Result<Vec<RawScoreRow>, ClickhouseError> {
    if query.target.ids().is_empty() {
        return Ok(Vec::new());
    }
    build_scores_query(query)
        .fetch_all::<ChScoreRow>(client, "scores")
        .await?
        .into_iter()
        .map(RawScoreRow::try_from)
        .collect()
}

#[derive(Row, Deserialize)]
struct ChScoreNameRow {
    name: String,
    values: Vec<String>,
}

pub fn build_score_names_query(
    project_id: &str,
    data_type: ScoreDataType,
    from_timestamp: Option<DateTime<Utc>>,
) -> BuiltQuery {
    let mut params = QueryParams::default();
    let project = params.push("projectId", ParamValue::String(project_id.to_string()));
    let mut pre_dedup = Vec::new();
    if let Some(from) = from_timestamp {
        pre_dedup.push(format!(
            "timestamp >= {}",
            timestamp_param(&mut params, "fromTimestamp", from.timestamp_millis())
        ));
    }
    let data_type = params.push(
        "dataType",
        ParamValue::String(data_type.as_str().to_string()),
    );
    let dedup = dedup_subquery("scores", SCORE_COLUMNS, &project, &pre_dedup);

    SqlBuilder::new(params)
        .always(format!(
            "SELECT s.name AS name, \
             arraySort(groupUniqArrayIf(assumeNotNull(s.string_value), s.string_value IS NOT NULL)) AS values\n\
             FROM ({}) s",
            dedup
        ))
        .always(format!("WHERE s.data_type = {}", data_type))
        .always("GROUP BY s.name\nORDER BY s.name ASC")
        .build()
}

/// Numeric scores report names only
pub async fn score_names(
    client: &Client,
    project_id: &str,
    data_type: ScoreDataType,
    from_timestamp: Option<DateTime<Utc>>,
) -> Result<Vec<ScoreNameRow>, ClickhouseError> {
    let rows = build_score_names_query(project_id, data_type, from_timestamp)
        .fetch_all::<ChScoreNameRow>(client, "score_names")
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| ScoreNameRow {
            name: row.name,
            values: if data_type == ScoreDataType::Numeric {
                Vec::new()
            } else {
                row.values
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scores_query_filters_after_dedup() {
        let query = ScoreQuery::new("p", ScoreTarget::Traces(vec!["t1".into(), "t2".into()]));
        let q = build_scores_query(&query);
        let dedup = q.sql.find("LIMIT 1 BY id, project_id").unwrap();
        let target = q.sql.find("WHERE has({targetIds:Array(String)}, s.trace_id)").unwrap();
        assert!(dedup < target);
        assert!(q.sql.contains("ORDER BY s.timestamp DESC"));
        assert!(!q.sql.contains("{limit"));
        assert_eq!(q.params.names(), vec!["projectId", "targetIds"]);
    }

    fn fetchable<T: clickhouse::RowOwned + clickhouse::RowRead>() {}

    #[test]
    fn test_rows_satisfy_fetch_bounds() {
        fetchable::<ChScoreRow>();
        fetchable::<ChScoreNameRow>();
        fetchable::<String>();
        fetchable::<u64>();
        fetchable::<bool>();
    }

    #[test]
    fn test_scores_query_reads_only_known_columns() {
        let query = ScoreQuery::new("p", ScoreTarget::Sessions(vec!["s1".into()]));
        let q = build_scores_query(&query);
        assert!(q.sql.contains(&format!("SELECT {} FROM scores", SCORE_COLUMNS)));
        assert!(!q.sql.contains("SELECT *"));
    }

    #[test]
    fn test_scores_query_bounds_and_limit() {
        let min = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let query = ScoreQuery::new("p", ScoreTarget::Sessions(vec!["s1".into()]))
            .with_min_timestamp(Some(min))
            .with_limit(Some(1000), Some(0));
        let q = build_scores_query(&query);
        assert!(q.sql.contains("timestamp >= fromUnixTimestamp64Milli({minTimestamp:Int64})"));
        assert!(q.sql.contains("s.session_id"));
        assert!(q.sql.ends_with("LIMIT {limit:UInt32} OFFSET {offset:UInt64}"));
        assert_eq!(
            q.params.get("minTimestamp"),
            Some(&ParamValue::Int64(min.timestamp_millis()))
        );
        assert_eq!(q.params.get("limit"), Some(&ParamValue::UInt32(1000)));
    }

    #[test]
    fn test_score_names_query() {
        let q = build_score_names_query("p", ScoreDataType::Categorical, None);
        assert!(q.sql.contains("WHERE s.data_type = {dataType:String}"));
        assert_eq!(
            q.params.get("dataType"),
            Some(&ParamValue::String("CATEGORICAL".to_string()))
        );
        assert!(q.params.get("fromTimestamp").is_none());
    }
}
