//! Time helpers for hour-granular granule timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MosaicError;

/// Truncate an instant to the start of its UTC hour.
pub fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - Duration::seconds((dt.minute() * 60 + dt.second()) as i64)
        - Duration::nanoseconds(dt.nanosecond() as i64)
}

/// Start of the UTC day containing `dt`.
pub fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - Duration::seconds(dt.num_seconds_from_midnight() as i64)
        - Duration::nanoseconds(dt.nanosecond() as i64)
}

/// Format an instant the way the mosaic index stores its time attribute,
/// e.g. `2024-03-10T12:00:00.000Z`.
pub fn format_instant(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A time of day whose granule survives intraday pruning.
///
/// Serialized as `"HH:MM"`. Granules are stamped on whole hours, so an entry
/// with non-zero minutes never matches one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArchiveHour {
    hour: u32,
    minute: u32,
}

impl ArchiveHour {
    pub fn new(hour: u32, minute: u32) -> Result<Self, MosaicError> {
        if hour > 23 || minute > 59 {
            return Err(MosaicError::InvalidConfig(format!(
                "archive hour out of range: {:02}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// The instant this archive hour falls on, for the day starting at `day_start`.
    pub fn on(&self, day_start: DateTime<Utc>) -> DateTime<Utc> {
        start_of_day(day_start)
            + Duration::hours(self.hour as i64)
            + Duration::minutes(self.minute as i64)
    }

    /// Whether `dt` falls exactly on this time of day.
    pub fn matches(&self, dt: DateTime<Utc>) -> bool {
        dt.hour() == self.hour && dt.minute() == self.minute && dt.second() == 0 && dt.nanosecond() == 0
    }
}

impl fmt::Display for ArchiveHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ArchiveHour {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MosaicError::InvalidConfig(format!("invalid archive hour '{}', expected HH:MM", s));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse().map_err(|_| invalid())?;
        let minute = minute.parse().map_err(|_| invalid())?;
        ArchiveHour::new(hour, minute)
    }
}

impl TryFrom<String> for ArchiveHour {
    type Error = MosaicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArchiveHour> for String {
    fn from(value: ArchiveHour) -> Self {
        value.to_string()
    }
}
