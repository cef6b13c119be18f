//! Timestamp helpers.
//!
//! All `*Utc` fields in the data model are stored as `i64` microseconds
//! since the Unix epoch. These helpers convert to/from `chrono` types at the
//! API boundary.

use chrono::{DateTime, NaiveDateTime, Utc};

/// The sentinel epoch below which a caller-supplied `createdUtc` is coerced
/// to "now" (year 1753, matching the historical SQL `datetime` minimum).
pub fn min_valid_epoch_micros() -> i64 {
    // 1753-01-01T00:00:00Z
    const YEAR_1753_UNIX_SECS: i64 = -6_847_804_800;
    YEAR_1753_UNIX_SECS * 1_000_000
}

/// Current time as microseconds since the Unix epoch.
#[must_use]
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Coerce a caller-supplied timestamp: if it is below the sentinel epoch,
/// replace it with "now".
#[must_use]
pub fn coerce_created_utc(micros: i64) -> i64 {
    if micros < min_valid_epoch_micros() {
        now_micros()
    } else {
        micros
    }
}

/// Convert microseconds since epoch to a naive UTC datetime.
#[must_use]
pub fn micros_to_naive(micros: i64) -> NaiveDateTime {
    DateTime::from_timestamp_micros(micros)
        .unwrap_or_default()
        .naive_utc()
}

/// Convert a naive UTC datetime to microseconds since epoch.
#[must_use]
pub fn naive_to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

/// Parse an ISO-8601 string into microseconds since epoch.
pub fn iso_to_micros(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_micros())
}

/// Format microseconds since epoch as an ISO-8601 string.
#[must_use]
pub fn micros_to_iso(micros: i64) -> String {
    DateTime::from_timestamp_micros(micros)
        .unwrap_or_default()
        .to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_epoch_is_coerced_to_now() {
        let before = now_micros();
        let coerced = coerce_created_utc(0);
        let after = now_micros();
        assert!(coerced >= before && coerced <= after);
    }

    #[test]
    fn above_epoch_passes_through() {
        let now = now_micros();
        assert_eq!(coerce_created_utc(now), now);
    }

    #[test]
    fn iso_round_trip() {
        let now = now_micros();
        let iso = micros_to_iso(now);
        let parsed = iso_to_micros(&iso).unwrap();
        // rfc3339 truncates to microsecond precision already, so round trip is exact.
        assert_eq!(parsed, now);
    }
}
