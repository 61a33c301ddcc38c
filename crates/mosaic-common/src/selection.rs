//! Time-windowed granule selections.
//!
//! A selection is evaluated either by the store (rendered as a CQL filter on
//! the index's time attribute) or locally against decoded timestamps. Both
//! forms must agree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::format_instant;

/// Name of the mosaic index attribute holding the granule instant.
pub const TIME_ATTRIBUTE: &str = "ingestion";

/// Upper end of a selection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpperBound {
    /// `timestamp < t`
    Before(DateTime<Utc>),
    /// `timestamp <= t`
    AtOrBefore(DateTime<Utc>),
}

impl UpperBound {
    fn admits(&self, ts: DateTime<Utc>) -> bool {
        match self {
            UpperBound::Before(t) => ts < *t,
            UpperBound::AtOrBefore(t) => ts <= *t,
        }
    }
}

/// Granules with `start <= timestamp`, below `end`, and not in `except`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranuleSelection {
    pub start: Option<DateTime<Utc>>,
    pub end: UpperBound,
    pub except: Vec<DateTime<Utc>>,
}

impl GranuleSelection {
    /// Everything at or before `cutoff`.
    pub fn at_or_before(cutoff: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: UpperBound::AtOrBefore(cutoff),
            except: Vec::new(),
        }
    }

    /// Everything in `[start, end)` except the listed instants.
    pub fn window(start: DateTime<Utc>, end: DateTime<Utc>, except: Vec<DateTime<Utc>>) -> Self {
        Self {
            start: Some(start),
            end: UpperBound::Before(end),
            except,
        }
    }

    /// Evaluate the selection against a granule timestamp.
    pub fn matches(&self, ts: DateTime<Utc>) -> bool {
        self.end.admits(ts)
            && self.start.map_or(true, |start| ts >= start)
            && !self.except.contains(&ts)
    }

    /// Render as a CQL filter on `attribute`.
    pub fn to_cql(&self, attribute: &str) -> String {
        let mut clauses = Vec::with_capacity(2 + self.except.len());

        clauses.push(match self.end {
            UpperBound::Before(t) => format!("{}<{}", attribute, format_instant(t)),
            UpperBound::AtOrBefore(t) => format!("{}<={}", attribute, format_instant(t)),
        });
        if let Some(start) = self.start {
            clauses.push(format!("{}>={}", attribute, format_instant(start)));
        }
        for t in &self.except {
            clauses.push(format!("{}<>{}", attribute, format_instant(*t)));
        }

        clauses.join(" AND ")
    }
}

impl fmt::Display for GranuleSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cql(TIME_ATTRIBUTE))
    }
}
