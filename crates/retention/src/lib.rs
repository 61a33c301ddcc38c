//! Retention policy for mosaic layers.
//!
//! A sweep runs three selections in order:
//!
//! 1. today's superseded hourly granules, `[start_of_today, now)` minus
//!    today's archive hours
//! 2. yesterday's superseded hourly granules, `[start_of_yesterday,
//!    start_of_today)` minus yesterday's archive hours
//! 3. the daily cutoff, everything at or before the start of the day
//!    `days_to_keep` days ago, archive hours included
//!
//! The policy is a pure function of `now`; the mosaic crate executes the
//! selections against a store.

mod policy;
mod window;

pub use policy::{RetentionPolicy, SweepRule, SweepStep};
pub use window::RetentionWindow;
