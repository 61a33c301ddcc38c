//! Day boundaries derived from the sweep instant.

use chrono::{DateTime, Duration, Utc};

use mosaic_common::{start_of_day, truncate_to_hour};

/// Boundaries for one sweep. Recomputed every run, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    /// Sweep instant truncated to the hour
    pub now: DateTime<Utc>,
    pub start_of_today: DateTime<Utc>,
    pub start_of_yesterday: DateTime<Utc>,
    /// Granules at or before this instant are expired
    pub cutoff: DateTime<Utc>,
}

impl RetentionWindow {
    pub fn new(now: DateTime<Utc>, days_to_keep: u32) -> Self {
        let now = truncate_to_hour(now);
        let start_of_today = start_of_day(now);
        Self {
            now,
            start_of_today,
            start_of_yesterday: start_of_today - Duration::days(1),
            cutoff: start_of_day(
                now.checked_sub_signed(Duration::days(i64::from(days_to_keep)))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 20, 0).unwrap();
        let window = RetentionWindow::new(now, 30);

        assert_eq!(window.now, Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap());
        assert_eq!(
            window.start_of_today,
            Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.start_of_yesterday,
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );
        assert_eq!(window.cutoff, Utc.with_ymd_and_hms(2024, 2, 9, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_zero_days_cuts_at_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let window = RetentionWindow::new(now, 0);
        assert_eq!(window.cutoff, window.start_of_today);
    }

    #[test]
    fn test_cutoff_clamps_past_calendar_range() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let window = RetentionWindow::new(now, 100_000_000);
        assert_eq!(window.cutoff, DateTime::<Utc>::MIN_UTC);
        assert_eq!(window.start_of_today, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
    }
}
