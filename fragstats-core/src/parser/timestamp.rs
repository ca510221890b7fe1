//! Log timestamp parsing
//!
//! Server logs carry a fixed `MM/DD/YYYY - HH:MM:SS` timestamp (24-hour
//! clock, zero-padded fields). A line that structurally matched an event rule
//! but carries an unparsable timestamp indicates a rule/text mismatch, so
//! parsing fails loudly instead of defaulting.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// strftime format of the log timestamp.
pub const LOG_TIME_FORMAT: &str = "%m/%d/%Y - %H:%M:%S";

/// Parse a log timestamp into an absolute point in time.
///
/// Log timestamps carry no zone; they are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, LOG_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Timestamp {
            value: value.to_string(),
            message: e.to_string(),
        })
}

/// Format a point in time back into the log's textual format.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(LOG_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_valid_timestamp() {
        let ts = parse_timestamp("02/09/2026 - 12:34:56").unwrap();
        assert_eq!(ts.month(), 2);
        assert_eq!(ts.day(), 9);
        assert_eq!(ts.year(), 2026);
        assert_eq!(ts.hour(), 12);
        assert_eq!(ts.minute(), 34);
        assert_eq!(ts.second(), 56);
    }

    #[test]
    fn test_parse_rejects_wrong_field_order() {
        // ISO order does not match the log format
        assert!(parse_timestamp("2026-02-09 12:34:56").is_err());
    }

    #[test]
    fn test_parse_rejects_impossible_date() {
        let err = parse_timestamp("13/45/2026 - 12:34:56").unwrap_err();
        assert!(matches!(err, Error::Timestamp { .. }));
    }

    #[test]
    fn test_round_trip() {
        for value in [
            "01/01/1999 - 00:00:00",
            "02/09/2026 - 12:34:56",
            "12/31/2030 - 23:59:59",
        ] {
            let ts = parse_timestamp(value).unwrap();
            assert_eq!(format_timestamp(ts), value);
            assert_eq!(parse_timestamp(&format_timestamp(ts)).unwrap(), ts);
        }
    }
}
