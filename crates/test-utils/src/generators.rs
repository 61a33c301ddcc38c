//! Timestamp and filename generators for granule fixtures.

use chrono::{DateTime, Duration, TimeZone, Utc};

use mosaic_common::encode;

/// Hour-aligned UTC instant.
///
/// Panics on an invalid date, which is what a test wants.
pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture date {}-{}-{} {}h", year, month, day, hour))
}

/// `count` instants starting at `start`, `step_hours` apart.
pub fn hourly_series(start: DateTime<Utc>, count: usize, step_hours: i64) -> Vec<DateTime<Utc>> {
    (0..count as i64)
        .map(|i| start + Duration::hours(i * step_hours))
        .collect()
}

/// Granule filename for a fixture instant.
pub fn granule_name(layer: &str, ts: DateTime<Utc>) -> String {
    encode(layer, ts).unwrap_or_else(|e| panic!("fixture timestamp not encodable: {}", e))
}
