//! Declared mapping from logical session columns to physical columns
//!
//! Every filterable or sortable column is listed here. Lookups for names not
//! in the table fail, so unknown columns are rejected at translation time.

use super::types::FilterError;

/// Where in the session pipeline a column can be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStage {
    /// Evaluated per deduplicated trace, before grouping
    Trace,
    /// Evaluated per aggregated session
    Session,
    /// Lives only in the metadata store
    Relational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    StringArray,
    Number,
    Decimal,
    Datetime,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Logical name used by callers
    pub id: &'static str,
    /// Physical column, relative to the stage's table alias
    pub physical: &'static str,
    pub stage: ColumnStage,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub sortable: bool,
    /// Needs the observation rollup joined in
    pub requires_observations: bool,
}

pub const SESSION_ID: &str = "id";
pub const CREATED_AT: &str = "createdAt";
pub const BOOKMARKED: &str = "bookmarked";
pub const TIMESTAMP: &str = "timestamp";

const fn col(
    id: &'static str,
    physical: &'static str,
    stage: ColumnStage,
    kind: ColumnKind,
) -> ColumnDef {
    ColumnDef {
        id,
        physical,
        stage,
        kind,
        nullable: false,
        sortable: false,
        requires_observations: false,
    }
}

const fn sortable(mut def: ColumnDef) -> ColumnDef {
    def.sortable = true;
    def
}

const fn nullable(mut def: ColumnDef) -> ColumnDef {
    def.nullable = true;
    def
}

const fn with_observations(mut def: ColumnDef) -> ColumnDef {
    def.requires_observations = true;
    def
}

use ColumnKind as K;
use ColumnStage as S;

pub const SESSION_COLUMNS: &[ColumnDef] = &[
    // Grouping key, so filtering the traces keeps exactly the same sessions
    sortable(col(SESSION_ID, "session_id", S::Trace, K::String)),
    // Session stage
    col("userIds", "user_ids", S::Session, K::StringArray),
    sortable(col(CREATED_AT, "min_timestamp", S::Session, K::Datetime)),
    sortable(col("countTraces", "trace_count", S::Session, K::Number)),
    col("traceTags", "trace_tags", S::Session, K::StringArray),
    sortable(col("sessionDuration", "duration", S::Session, K::Number)),
    with_observations(sortable(col(
        "totalObservations",
        "total_observations",
        S::Session,
        K::Number,
    ))),
    with_observations(sortable(col(
        "inputCost",
        "session_input_cost",
        S::Session,
        K::Decimal,
    ))),
    with_observations(sortable(col(
        "outputCost",
        "session_output_cost",
        S::Session,
        K::Decimal,
    ))),
    with_observations(sortable(col(
        "totalCost",
        "session_total_cost",
        S::Session,
        K::Decimal,
    ))),
    with_observations(sortable(col(
        "inputTokens",
        "session_input_usage",
        S::Session,
        K::Number,
    ))),
    with_observations(sortable(col(
        "outputTokens",
        "session_output_usage",
        S::Session,
        K::Number,
    ))),
    with_observations(sortable(col(
        "totalTokens",
        "session_total_usage",
        S::Session,
        K::Number,
    ))),
    // Trace stage
    nullable(col("userId", "user_id", S::Trace, K::String)),
    col("environment", "environment", S::Trace, K::String),
    col(TIMESTAMP, "timestamp", S::Trace, K::Datetime),
    nullable(col("traceName", "name", S::Trace, K::String)),
    // Metadata store
    col(BOOKMARKED, "bookmarked", S::Relational, K::Boolean),
];

/// Look up a logical column
pub fn lookup(id: &str) -> Option<&'static ColumnDef> {
    SESSION_COLUMNS.iter().find(|c| c.id == id)
}

/// Look up a logical column, failing on unknown names
pub fn resolve(id: &str) -> Result<&'static ColumnDef, FilterError> {
    lookup(id).ok_or_else(|| FilterError::UnknownColumn(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_column_ids_unique() {
        let ids: HashSet<_> = SESSION_COLUMNS.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), SESSION_COLUMNS.len());
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let def = resolve("totalCost").unwrap();
        assert_eq!(def.physical, "session_total_cost");
        assert_eq!(def.kind, ColumnKind::Decimal);
        assert!(def.requires_observations);

        assert!(matches!(
            resolve("total_cost"),
            Err(FilterError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_stages() {
        assert_eq!(resolve("userId").unwrap().stage, ColumnStage::Trace);
        assert_eq!(resolve(SESSION_ID).unwrap().stage, ColumnStage::Trace);
        assert_eq!(resolve("userIds").unwrap().stage, ColumnStage::Session);
        assert_eq!(resolve(BOOKMARKED).unwrap().stage, ColumnStage::Relational);
    }

    #[test]
    fn test_duration_does_not_need_observations() {
        assert!(!resolve("sessionDuration").unwrap().requires_observations);
    }
}
