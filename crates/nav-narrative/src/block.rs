use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::DayPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    /// Calculated (and official, when published) opening NAV.
    Opening,
    /// Official and calculated opening NAV disagree; both are shown.
    OpeningDivergence,
    /// One trade, or a cluster of adjacent trades on one instrument.
    Trade,
    /// Stock trade that covered an overnight assignment.
    AssignmentCover,
    Assignment,
    /// One or more worthless expirations on one underlying at one instant.
    PremiumRetained,
    OptionExpired,
    CashTransfer,
    Unclassified,
    /// Residual official - calculated at the close, accepted as terminal.
    MarkToMarket,
}

/// One narrated unit of the day. `pnl` is the NAV impact in reporting
/// currency; `nav_after` is the running NAV once the block is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeBlock {
    pub phase: DayPhase,
    pub kind: BlockKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub description: String,
    pub event_ids: Vec<String>,
    pub pnl: Decimal,
    pub nav_after: Decimal,
}

impl NarrativeBlock {
    pub fn is_grouped(&self) -> bool {
        self.event_ids.len() > 1
    }
}
