//! nav-reconcile
//!
//! Reconciliation Reporter. Turns a day's `DailyNAVRecord` plus what the
//! narrative observed into a drift report: the exact signed difference,
//! the explanations that can account for it, and whether it is material.
//!
//! Deterministic, pure logic. No IO. Material drift is escalated, never an
//! error.

mod engine;
mod types;

pub use engine::{report, report_opening};
pub use types::*;
