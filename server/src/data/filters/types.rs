//! Filter type definitions
//!
//! Defines the filter types and operators accepted by session queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::columns::{self, ColumnKind};

/// Filter rejected while parsing or translating
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Filter JSON exceeds maximum size of {max} bytes")]
    TooLarge { max: usize },

    #[error("Invalid filter JSON: {0}")]
    InvalidJson(String),

    #[error("Maximum {max} filters allowed")]
    TooMany { max: usize },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Filter type '{filter}' cannot be applied to column {column}")]
    TypeMismatch { column: String, filter: &'static str },

    #[error("Cannot order by: {0}")]
    NotSortable(String),

    #[error("Invalid order_by format. Use 'column' or 'column:asc' or 'column:desc'")]
    InvalidOrder,

    #[error("Column {0} must be resolved against the metadata store first")]
    Unresolved(String),
}

impl FilterError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "FILTER_JSON_TOO_LARGE",
            Self::InvalidJson(_) => "INVALID_FILTER_JSON",
            Self::TooMany { .. } => "TOO_MANY_FILTERS",
            Self::UnknownColumn(_) => "INVALID_FILTER_COLUMN",
            Self::TypeMismatch { .. } => "INVALID_FILTER_TYPE",
            Self::NotSortable(_) => "INVALID_ORDER_COLUMN",
            Self::InvalidOrder => "INVALID_ORDER",
            Self::Unresolved(_) => "UNRESOLVED_FILTER_COLUMN",
        }
    }
}

/// Filter types for session queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Datetime {
        column: String,
        operator: DatetimeOp,
        value: DateTime<Utc>,
    },
    String {
        column: String,
        operator: StringOp,
        value: String,
    },
    Number {
        column: String,
        operator: NumberOp,
        value: f64,
    },
    StringOptions {
        column: String,
        operator: OptionsOp,
        value: Vec<String>,
    },
    ArrayOptions {
        column: String,
        operator: ArrayOptionsOp,
        value: Vec<String>,
    },
    Boolean {
        column: String,
        operator: BooleanOp,
        value: bool,
    },
    Null {
        column: String,
        operator: NullOp,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatetimeOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionsOp {
    #[serde(rename = "any of")]
    AnyOf,
    #[serde(rename = "none of")]
    NoneOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayOptionsOp {
    #[serde(rename = "any of")]
    AnyOf,
    #[serde(rename = "all of")]
    AllOf,
    #[serde(rename = "none of")]
    NoneOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullOp {
    #[serde(rename = "is null")]
    IsNull,
    #[serde(rename = "is not null")]
    IsNotNull,
}

impl DatetimeOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

impl NumberOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

impl Filter {
    /// `column any of values`
    pub fn any_of(column: &str, value: Vec<String>) -> Self {
        Self::StringOptions {
            column: column.to_string(),
            operator: OptionsOp::AnyOf,
            value,
        }
    }

    /// `column none of values`
    pub fn none_of(column: &str, value: Vec<String>) -> Self {
        Self::StringOptions {
            column: column.to_string(),
            operator: OptionsOp::NoneOf,
            value,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Datetime { column, .. }
            | Self::String { column, .. }
            | Self::Number { column, .. }
            | Self::StringOptions { column, .. }
            | Self::ArrayOptions { column, .. }
            | Self::Boolean { column, .. }
            | Self::Null { column, .. } => column,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Datetime { .. } => "datetime",
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::StringOptions { .. } => "string_options",
            Self::ArrayOptions { .. } => "array_options",
            Self::Boolean { .. } => "boolean",
            Self::Null { .. } => "null",
        }
    }

    /// Check the column exists and accepts this filter type
    pub fn validate(&self) -> Result<(), FilterError> {
        let def = columns::resolve(self.column())?;
        let compatible = match self {
            Self::Datetime { .. } => def.kind == ColumnKind::Datetime,
            Self::String { .. } | Self::StringOptions { .. } => def.kind == ColumnKind::String,
            Self::Number { .. } => matches!(def.kind, ColumnKind::Number | ColumnKind::Decimal),
            Self::ArrayOptions { .. } => def.kind == ColumnKind::StringArray,
            Self::Boolean { .. } => def.kind == ColumnKind::Boolean,
            Self::Null { .. } => def.nullable,
        };
        if compatible {
            Ok(())
        } else {
            Err(FilterError::TypeMismatch {
                column: def.id.to_string(),
                filter: self.type_name(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Desc,
    Asc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Requested ordering on a logical session column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Parse `column`, `column:asc` or `column:desc`
    pub fn parse(s: &str) -> Result<Self, FilterError> {
        let parts: Vec<&str> = s.split(':').collect();
        let (column, direction) = match parts.as_slice() {
            [col] => (*col, OrderDirection::Desc),
            [col, "asc"] => (*col, OrderDirection::Asc),
            [col, "desc"] => (*col, OrderDirection::Desc),
            _ => return Err(FilterError::InvalidOrder),
        };
        let order = Self {
            column: column.to_string(),
            direction,
        };
        order.validate()?;
        Ok(order)
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        let def = columns::resolve(&self.column)?;
        if !def.sortable {
            return Err(FilterError::NotSortable(self.column.clone()));
        }
        Ok(())
    }

    /// Default session ordering: newest first
    pub fn created_at_desc() -> Self {
        Self {
            column: columns::CREATED_AT.to_string(),
            direction: OrderDirection::Desc,
        }
    }
}
