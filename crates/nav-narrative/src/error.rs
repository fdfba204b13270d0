use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::DayPhase;

/// Ordering and phase violations. Any of these means the input timeline is
/// inconsistent; the day is not narrated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrativeError {
    #[error("{date} is not a trading day")]
    NotATradingDay { date: NaiveDate },

    #[error("event '{external_id}' at {timestamp} lies outside the window of {date} ({start}, {end}]")]
    OutsideDayWindow {
        external_id: String,
        timestamp: DateTime<Utc>,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("event '{external_id}' is out of order after '{previous}'")]
    OutOfOrder { external_id: String, previous: String },

    #[error("event '{external_id}' appears twice in the day")]
    DuplicateEvent { external_id: String },

    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition { from: DayPhase, to: DayPhase },

    #[error("event '{external_id}' belongs to {event_phase:?} but the day is in {current:?}")]
    EventInWrongPhase {
        external_id: String,
        event_phase: DayPhase,
        current: DayPhase,
    },

    #[error("carry-over state as of {as_of} cannot feed {date}")]
    StaleCarryOver { as_of: NaiveDate, date: NaiveDate },

    #[error("days must be consecutive trading days: {previous} then {date}")]
    NonConsecutiveDays { previous: NaiveDate, date: NaiveDate },
}
