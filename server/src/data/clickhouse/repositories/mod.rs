//! ClickHouse repository modules
//!
//! Provides read access to the event tables:
//! - **sessions**: session aggregation, counting and metrics
//! - **scores**: deduplicated score lookups and score names
//! - **traces**: session trace listing, trace cost and filter options

pub mod scores;
pub mod sessions;
pub mod traces;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::ClickhouseError;

/// Milliseconds since epoch as selected by `toUnixTimestamp64Milli`
pub(crate) fn millis_to_datetime(
    column: &'static str,
    ms: i64,
) -> Result<DateTime<Utc>, ClickhouseError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| ClickhouseError::InvalidValue {
        column,
        value: ms.to_string(),
    })
}

/// Decimal aggregates are selected with `toString` to keep full precision
pub(crate) fn parse_decimal(column: &'static str, value: &str) -> Result<Decimal, ClickhouseError> {
    Decimal::from_str(value).map_err(|_| ClickhouseError::InvalidValue {
        column,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_keeps_precision() {
        let d = parse_decimal("total_cost", "0.600000000000").unwrap();
        assert_eq!(d, Decimal::from_str("0.6").unwrap());
        assert!(parse_decimal("total_cost", "n/a").is_err());
    }

    #[test]
    fn test_millis_to_datetime() {
        let dt = millis_to_datetime("timestamp", 1_700_000_000_123).unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
    }
}
