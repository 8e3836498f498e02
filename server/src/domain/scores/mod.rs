//! Scores attached to traces and sessions
//!
//! - `validate` - Raw row to typed score, dropping malformed rows
//! - `resolver` - Chunked lookups against the event store
//! - `aggregate` - Rollups by name, source and data type

mod aggregate;
mod resolver;
mod types;
mod validate;

pub use aggregate::{AggregatedScore, ValueCount, aggregate_scores};
pub use resolver::ScoreResolver;
pub use types::{Score, ScoreValue};
pub use validate::{ScoreValidationError, parse_score, validate_scores};
