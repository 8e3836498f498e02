//! Filter parsing
//!
//! Parses JSON filter definitions into Filter structs with validation.

use crate::core::constants::{MAX_FILTER_JSON_SIZE, MAX_FILTERS};

use super::types::{Filter, FilterError};

/// Parse filters from a JSON array
///
/// Validates JSON size, parses into Filter structs, and validates columns
/// against the session column table.
pub fn parse_filters(json_str: &str) -> Result<Vec<Filter>, FilterError> {
    if json_str.len() > MAX_FILTER_JSON_SIZE {
        return Err(FilterError::TooLarge {
            max: MAX_FILTER_JSON_SIZE,
        });
    }

    let filters: Vec<Filter> =
        serde_json::from_str(json_str).map_err(|e| FilterError::InvalidJson(e.to_string()))?;

    if filters.len() > MAX_FILTERS {
        return Err(FilterError::TooMany { max: MAX_FILTERS });
    }

    for filter in &filters {
        filter.validate()?;
    }

    Ok(filters)
}
