//! Retention rules and the selections they produce.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mosaic_common::{ArchiveHour, GranuleSelection};

use crate::window::RetentionWindow;

fn default_archive_hours() -> Vec<ArchiveHour> {
    // 12:00 UTC is always representable
    ArchiveHour::new(12, 0).into_iter().collect()
}

fn default_days_to_keep() -> u32 {
    30
}

/// Retention settings of one mosaic layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Times of day exempt from intraday pruning
    #[serde(default = "default_archive_hours")]
    pub archive_hours: Vec<ArchiveHour>,
    /// Days of history kept before the hard cutoff
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            archive_hours: default_archive_hours(),
            days_to_keep: default_days_to_keep(),
        }
    }
}

/// The three sweep rules, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepRule {
    TodayHourly,
    YesterdayHourly,
    DailyCutoff,
}

impl SweepRule {
    pub const ORDER: [SweepRule; 3] = [
        SweepRule::TodayHourly,
        SweepRule::YesterdayHourly,
        SweepRule::DailyCutoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepRule::TodayHourly => "today_hourly",
            SweepRule::YesterdayHourly => "yesterday_hourly",
            SweepRule::DailyCutoff => "daily_cutoff",
        }
    }
}

impl fmt::Display for SweepRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule of a sweep with the concrete selection it deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepStep {
    pub rule: SweepRule,
    pub selection: GranuleSelection,
}

impl RetentionPolicy {
    pub fn new(archive_hours: Vec<ArchiveHour>, days_to_keep: u32) -> Self {
        Self {
            archive_hours,
            days_to_keep,
        }
    }

    pub fn window(&self, now: DateTime<Utc>) -> RetentionWindow {
        RetentionWindow::new(now, self.days_to_keep)
    }

    /// The selection a single rule deletes at `now`.
    pub fn selection(&self, rule: SweepRule, now: DateTime<Utc>) -> GranuleSelection {
        let window = self.window(now);
        match rule {
            SweepRule::TodayHourly => GranuleSelection::window(
                window.start_of_today,
                window.now,
                self.archive_instants(window.start_of_today),
            ),
            SweepRule::YesterdayHourly => GranuleSelection::window(
                window.start_of_yesterday,
                window.start_of_today,
                self.archive_instants(window.start_of_yesterday),
            ),
            SweepRule::DailyCutoff => GranuleSelection::at_or_before(window.cutoff),
        }
    }

    /// All sweep steps at `now`, in the order they must run.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<SweepStep> {
        SweepRule::ORDER
            .iter()
            .map(|&rule| SweepStep {
                rule,
                selection: self.selection(rule, now),
            })
            .collect()
    }

    /// Whether a granule at `ts` survives a sweep at `now`.
    pub fn retains(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.sweep(now).iter().all(|step| !step.selection.matches(ts))
    }

    pub fn is_archive_hour(&self, ts: DateTime<Utc>) -> bool {
        self.archive_hours.iter().any(|h| h.matches(ts))
    }

    fn archive_instants(&self, day_start: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        self.archive_hours.iter().map(|h| h.on(day_start)).collect()
    }
}
