//! Parameterized query construction for ClickHouse
//!
//! Every user-supplied value is registered in [`QueryParams`] and referenced
//! from the SQL text through a `{name:Type}` server-side placeholder. Only
//! structural fragments (column names from the column table, sort direction,
//! presence of LIMIT/OFFSET) are ever rendered into the SQL text itself.
//!
//! Queries are assembled by [`SqlBuilder`] from an ordered list of clauses,
//! each with a presence flag and a render function.

use clickhouse::Client;
use clickhouse::query::Query;

use crate::data::clickhouse::ClickhouseError;
use crate::data::filters::{
    ArrayOptionsOp, BooleanOp, ColumnKind, ColumnStage, Filter, FilterError, NullOp, OptionsOp,
    StringOp, columns,
};
use crate::utils::sql::escape_like_pattern;

// ============================================================================
// Parameters
// ============================================================================

/// Typed server-side parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    StringArray(Vec<String>),
    UInt32(u32),
    UInt64(u64),
    Int64(i64),
    Float64(f64),
}

impl ParamValue {
    /// ClickHouse type used in the placeholder
    pub fn ch_type(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::StringArray(_) => "Array(String)",
            Self::UInt32(_) => "UInt32",
            Self::UInt64(_) => "UInt64",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
        }
    }
}

/// Named parameters collected while rendering a query
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    values: Vec<(String, ParamValue)>,
}

impl QueryParams {
    /// Register a value under `name` and return its `{name:Type}` placeholder
    pub fn push(&mut self, name: &str, value: ParamValue) -> String {
        let placeholder = format!("{{{}:{}}}", name, value.ch_type());
        self.values.push((name.to_string(), value));
        placeholder
    }

    /// Register a value under a generated unique name
    pub fn push_anonymous(&mut self, prefix: &str, value: ParamValue) -> String {
        let name = format!("{}{}", prefix, self.values.len());
        self.push(&name, value)
    }

    pub fn names(&self) -> Vec<&str> {
        self.values.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Bind every parameter by name
    fn bind(&self, mut query: Query) -> Query {
        for (name, value) in &self.values {
            query = match value {
                ParamValue::String(v) => query.param(name, v),
                ParamValue::StringArray(v) => query.param(name, v),
                ParamValue::UInt32(v) => query.param(name, v),
                ParamValue::UInt64(v) => query.param(name, v),
                ParamValue::Int64(v) => query.param(name, v),
                ParamValue::Float64(v) => query.param(name, v),
            };
        }
        query
    }
}

// ============================================================================
// Clause builder
// ============================================================================

type Render<'a> = Box<dyn FnOnce(&mut QueryParams) -> String + 'a>;

struct Clause<'a> {
    present: bool,
    render: Render<'a>,
}

/// Ordered list of optional SQL clauses
pub struct SqlBuilder<'a> {
    params: QueryParams,
    clauses: Vec<Clause<'a>>,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(params: QueryParams) -> Self {
        Self {
            params,
            clauses: Vec::new(),
        }
    }

    /// Clause that is always rendered
    pub fn always(self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        self.when(true, move |_| sql)
    }

    /// Clause that is always rendered and may register parameters
    pub fn always_with(self, render: impl FnOnce(&mut QueryParams) -> String + 'a) -> Self {
        self.when(true, render)
    }

    /// Clause rendered only when `present` holds
    pub fn when(mut self, present: bool, render: impl FnOnce(&mut QueryParams) -> String + 'a) -> Self {
        self.clauses.push(Clause {
            present,
            render: Box::new(render),
        });
        self
    }

    pub fn build(self) -> BuiltQuery {
        let mut params = self.params;
        let parts: Vec<String> = self
            .clauses
            .into_iter()
            .filter(|clause| clause.present)
            .map(|clause| (clause.render)(&mut params))
            .filter(|sql| !sql.is_empty())
            .collect();
        BuiltQuery {
            sql: parts.join("\n"),
            params,
        }
    }
}

/// SQL template plus its named parameters
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: QueryParams,
}

impl BuiltQuery {
    fn prepare(&self, client: &Client, operation: &'static str) -> Query {
        tracing::trace!(
            operation,
            sql = %self.sql,
            params = ?self.params.names(),
            "ClickHouse query"
        );
        self.params.bind(client.query(&self.sql))
    }

    pub async fn fetch_all<T>(
        &self,
        client: &Client,
        operation: &'static str,
    ) -> Result<Vec<T>, ClickhouseError>
    where
        T: clickhouse::RowOwned + clickhouse::RowRead,
    {
        Ok(self.prepare(client, operation).fetch_all::<T>().await?)
    }

    pub async fn fetch_one<T>(
        &self,
        client: &Client,
        operation: &'static str,
    ) -> Result<T, ClickhouseError>
    where
        T: clickhouse::RowOwned + clickhouse::RowRead,
    {
        Ok(self.prepare(client, operation).fetch_one::<T>().await?)
    }
}

// ============================================================================
// Shared fragments
// ============================================================================

/// Latest version of every `(id, project_id)` of `table` within one project.
///
/// `pre_dedup` may only reference columns that are identical across all
/// versions of an entity.
pub fn dedup_subquery(table: &str, columns: &str, project: &str, pre_dedup: &[String]) -> String {
    let mut conditions = vec![format!("project_id = {}", project)];
    conditions.extend(pre_dedup.iter().cloned());
    format!(
        "SELECT {columns} FROM {table} WHERE {conditions} ORDER BY event_ts DESC LIMIT 1 BY id, project_id",
        columns = columns,
        table = table,
        conditions = conditions.join(" AND "),
    )
}

/// Milliseconds placeholder wrapped as DateTime64
pub fn timestamp_param(params: &mut QueryParams, name: &str, ms: i64) -> String {
    format!(
        "fromUnixTimestamp64Milli({})",
        params.push(name, ParamValue::Int64(ms))
    )
}

// ============================================================================
// Filter translation
// ============================================================================

/// Translate the filters of one pipeline stage into SQL conditions.
///
/// Columns are rendered as `{alias}.{physical}`. Filters on other stages are
/// skipped; relational columns are an error because they must have been
/// rewritten before reaching the event store.
pub fn translate_filters(
    filters: &[Filter],
    stage: ColumnStage,
    alias: &str,
    params: &mut QueryParams,
) -> Result<Vec<String>, FilterError> {
    let mut conditions = Vec::new();
    for filter in filters {
        filter.validate()?;
        let def = columns::resolve(filter.column())?;
        if def.stage == ColumnStage::Relational {
            return Err(FilterError::Unresolved(def.id.to_string()));
        }
        if def.stage != stage {
            continue;
        }
        let col = format!("{}.{}", alias, def.physical);
        if let Some(condition) = translate_one(filter, &col, def.kind, params) {
            conditions.push(condition);
        }
    }
    Ok(conditions)
}

fn translate_one(
    filter: &Filter,
    col: &str,
    kind: ColumnKind,
    params: &mut QueryParams,
) -> Option<String> {
    match filter {
        Filter::Datetime {
            operator, value, ..
        } => {
            let name = format!("filter{}", params.names().len());
            let ts = timestamp_param(params, &name, value.timestamp_millis());
            Some(format!("{} {} {}", col, operator.as_sql(), ts))
        }
        Filter::String {
            operator, value, ..
        } => {
            let (op, pattern) = match operator {
                StringOp::Eq => ("=", value.clone()),
                StringOp::Contains => ("ILIKE", format!("%{}%", escape_like_pattern(value))),
                StringOp::StartsWith => ("ILIKE", format!("{}%", escape_like_pattern(value))),
                StringOp::EndsWith => ("ILIKE", format!("%{}", escape_like_pattern(value))),
            };
            let p = params.push_anonymous("filter", ParamValue::String(pattern));
            Some(format!("{} {} {}", col, op, p))
        }
        Filter::Number {
            operator, value, ..
        } => {
            let p = params.push_anonymous("filter", ParamValue::Float64(*value));
            let lhs = if kind == ColumnKind::Decimal {
                format!("toFloat64({})", col)
            } else {
                col.to_string()
            };
            Some(format!("{} {} {}", lhs, operator.as_sql(), p))
        }
        Filter::StringOptions {
            operator, value, ..
        } => {
            if value.is_empty() {
                return None;
            }
            let p = params.push_anonymous("filter", ParamValue::StringArray(value.clone()));
            Some(match operator {
                OptionsOp::AnyOf => format!("has({}, {})", p, col),
                OptionsOp::NoneOf => format!("NOT has({}, {})", p, col),
            })
        }
        Filter::ArrayOptions {
            operator, value, ..
        } => {
            if value.is_empty() {
                return None;
            }
            let p = params.push_anonymous("filter", ParamValue::StringArray(value.clone()));
            Some(match operator {
                ArrayOptionsOp::AnyOf => format!("hasAny({}, {})", col, p),
                ArrayOptionsOp::AllOf => format!("hasAll({}, {})", col, p),
                ArrayOptionsOp::NoneOf => format!("NOT hasAny({}, {})", col, p),
            })
        }
        Filter::Boolean {
            operator, value, ..
        } => {
            let literal = if *value { "true" } else { "false" };
            Some(match operator {
                BooleanOp::Eq => format!("{} = {}", col, literal),
                BooleanOp::Ne => format!("{} != {}", col, literal),
            })
        }
        Filter::Null { operator, .. } => Some(match operator {
            NullOp::IsNull => format!("{} IS NULL", col),
            NullOp::IsNotNull => format!("{} IS NOT NULL", col),
        }),
    }
}
