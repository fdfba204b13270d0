use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EventSource, OptionContract};

// ---------------------------------------------------------------------------
// Narrative working state carried across a day boundary
// ---------------------------------------------------------------------------

/// Stock position created by an option assignment and not yet covered.
///
/// Lives only in the narrative engine's working state and the carry-over
/// checkpoint; it is never written as a ledger event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPosition {
    pub underlying: String,
    pub strike: Decimal,
    /// Shares delivered (-) or received (+) by the assignment.
    pub signed_quantity: i64,
    pub opened_at: DateTime<Utc>,
    /// `external_id` of the assignment event that opened it.
    pub source_external_id: String,
}

/// Open option premium lot, paired FIFO with its closing trade or expiration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLot {
    pub contract: OptionContract,
    /// Negative for written (short) contracts.
    pub signed_quantity: i64,
    /// Premium received (+) or paid (-) for the whole lot, net of commission,
    /// in the source currency.
    pub net_premium_local: Decimal,
    pub fx_rate: Decimal,
    pub opened_at: DateTime<Utc>,
    pub external_id: String,
}

/// Explicit, persisted checkpoint of narrative working state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryOverState {
    /// Trading day whose close produced this state (None = empty start).
    pub as_of: Option<NaiveDate>,
    pub assignments: Vec<AssignmentPosition>,
    pub option_lots: Vec<OptionLot>,
}

impl CarryOverState {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.option_lots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Daily NAV checkpoint
// ---------------------------------------------------------------------------

/// One per trading day. `reconciliation_delta` is closing-only and signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNAVRecord {
    pub date: NaiveDate,
    /// Not every source publishes an opening figure.
    pub official_opening_nav: Option<Decimal>,
    pub calculated_opening_nav: Decimal,
    pub official_closing_nav: Decimal,
    pub calculated_closing_nav: Decimal,
    pub reconciliation_delta: Decimal,
}

impl DailyNAVRecord {
    pub fn new(
        date: NaiveDate,
        official_opening_nav: Option<Decimal>,
        calculated_opening_nav: Decimal,
        official_closing_nav: Decimal,
        calculated_closing_nav: Decimal,
    ) -> Self {
        Self {
            date,
            official_opening_nav,
            calculated_opening_nav,
            official_closing_nav,
            calculated_closing_nav,
            reconciliation_delta: official_closing_nav - calculated_closing_nav,
        }
    }

    /// Signed opening divergence (official - calculated), when an official
    /// opening figure exists.
    pub fn opening_delta(&self) -> Option<Decimal> {
        self.official_opening_nav
            .map(|o| o - self.calculated_opening_nav)
    }
}

// ---------------------------------------------------------------------------
// Ingestion bookkeeping
// ---------------------------------------------------------------------------

/// Which report period has been applied, keyed by `(source, period_key)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCheckpoint {
    pub source: EventSource,
    /// e.g. `MTD:2024-06` or `DAY:2024-06-12`.
    pub period_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// SHA-256 of the canonical report JSON.
    pub report_digest: String,
    pub events_seen: i64,
    pub applied_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionReason {
    /// A previously-missing amount arrived.
    LateAmount,
    /// The source restated a value inside the grace window.
    Restatement,
    /// A provisional live event was replaced by settled data.
    SupersededByHistorical,
}

impl CorrectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionReason::LateAmount => "LATE_AMOUNT",
            CorrectionReason::Restatement => "RESTATEMENT",
            CorrectionReason::SupersededByHistorical => "SUPERSEDED_BY_HISTORICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LATE_AMOUNT" => Some(CorrectionReason::LateAmount),
            "RESTATEMENT" => Some(CorrectionReason::Restatement),
            "SUPERSEDED_BY_HISTORICAL" => Some(CorrectionReason::SupersededByHistorical),
            _ => None,
        }
    }
}

/// Audit row for an in-place change to a stored event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCorrection {
    pub external_id: String,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reason: CorrectionReason,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn delta_is_official_minus_calculated() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        let r = DailyNAVRecord::new(d, None, dec!(100), dec!(79754.81), dec!(79723.79));
        assert_eq!(r.reconciliation_delta, dec!(31.02));
        assert_eq!(r.opening_delta(), None);
    }

    #[test]
    fn carry_over_default_is_empty() {
        assert!(CarryOverState::default().is_empty());
    }
}
