//! nav-narrative
//!
//! Walks one trading day's ordered events through a strict phase machine and
//! produces the narrative blocks, the calculated opening and closing NAV, and
//! the carry-over state the next day starts from.
//!
//! The running NAV starts at the previous day's official close. Pre-market
//! events move it before the calculated open is taken; intraday events move
//! it until the close, where the residual to the official close is booked as
//! mark-to-market. Summing every block's `pnl` therefore always equals
//! `official_close - previous_official_close`.
//!
//! Pure and synchronous: no I/O. Persistence of the carry-over is the
//! caller's job.

mod block;
mod engine;
mod error;
mod lots;
mod phase;
mod tracker;

pub use block::{BlockKind, NarrativeBlock};
pub use engine::{
    DailyNarrative, DayInput, DayOfficials, NarrativeEngine, NarrativeStats,
    DEFAULT_GROUPING_WINDOW,
};
pub use error::NarrativeError;
pub use lots::{LotBook, LotClose, OptionTradeEffect};
pub use phase::DayPhase;
pub use tracker::{AssignmentTracker, CoverResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grouping_window_is_thirty_minutes() {
        assert_eq!(DEFAULT_GROUPING_WINDOW.as_secs(), 30 * 60);
    }
}
