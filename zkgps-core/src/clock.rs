//! Wall-clock helpers.

use chrono::{DateTime, Utc};

/// Current time truncated to whole milliseconds.
///
/// Commitments and proofs travel as millisecond timestamps, so values are
/// truncated at creation to keep signed messages stable across a JSON
/// round trip.
#[must_use]
pub fn now_ms() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
