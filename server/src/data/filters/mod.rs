//! Session query filters
//!
//! Backend-neutral filter, ordering and column definitions. Each event store
//! backend translates these itself: ClickHouse into parameterized SQL
//! fragments, the memory store into row predicates.
//!
//! ## Usage
//!
//! ```no_run
//! use sessionscope_server::data::filters::{OrderBy, parse_filters};
//!
//! let json_str = r#"[{"type": "number", "column": "countTraces", "operator": ">", "value": 1}]"#;
//! let filters = parse_filters(json_str).unwrap();
//! let order = OrderBy::parse("createdAt:desc").unwrap();
//! ```

pub mod columns;
mod parser;
mod types;

pub use columns::{ColumnDef, ColumnKind, ColumnStage};
pub use parser::parse_filters;
pub use types::{
    ArrayOptionsOp, BooleanOp, DatetimeOp, Filter, FilterError, NullOp, NumberOp, OptionsOp,
    OrderBy, OrderDirection, StringOp,
};
