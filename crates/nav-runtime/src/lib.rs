//! nav-runtime
//!
//! Daily batch wiring. One [`DailyJob`] takes a trading day through
//!
//! fetch → classify → upsert → supersede live → checkpoint → narrate →
//! reconcile → persist NAV record and carry-over
//!
//! in a single sequential pass, appending every correction, supersession,
//! escalation and fetch failure to the audit log when one is configured.
//!
//! Orchestration layer: errors are `anyhow` with context.

mod calendar;
mod job;

pub use calendar::calendar_from_config;
pub use job::{DailyJob, DailyRunOutcome, DayOutcome, IngestOutcome, OfficialNav};
