use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use nav_config::EngineConfig;
use nav_narrative::DailyNarrative;

/// What the runtime should do with a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftAction {
    /// No drift.
    Clean,
    /// Drift within the materiality threshold.
    Report,
    /// `|drift|` above the threshold (material drift detected).
    Escalate,
}

/// Candidate explanations, in report order. Amounts use the drift sign
/// convention (official - calculated).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "explanation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftExplanation {
    /// Commissions on positions still open; the official NAV has deducted
    /// them, the calculated NAV realizes them on close.
    Fees { amount: Decimal },
    /// Cash transfers whose amount never arrived; applied as 0.
    UnclassifiedCashTransfers { count: usize, external_ids: Vec<String> },
    /// Entries the classifier could not place; applied as 0.
    UnclassifiedEvents { count: usize, external_ids: Vec<String> },
    /// Activity the official figure has not absorbed yet: pre-market events
    /// at the open (quantified), provisional live events at the close (not).
    Timing {
        amount: Option<Decimal>,
        event_count: usize,
    },
    Unexplained { amount: Decimal },
}

/// Observations from the narrative used to explain drift.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftContext {
    pub open_position_commissions: Decimal,
    pub missing_amount_transfers: Vec<String>,
    pub unclassified_events: Vec<String>,
    pub premarket_impact: Decimal,
    pub premarket_event_count: usize,
    pub provisional_event_count: usize,
}

impl DriftContext {
    pub fn from_narrative(n: &DailyNarrative) -> Self {
        Self {
            open_position_commissions: n.stats.open_position_commissions,
            missing_amount_transfers: n.stats.missing_amount_transfers.clone(),
            unclassified_events: n.stats.unclassified_events.clone(),
            premarket_impact: n.stats.premarket_impact,
            premarket_event_count: n.stats.premarket_event_count,
            provisional_event_count: n.stats.provisional_event_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftPolicy {
    pub materiality_threshold: Decimal,
}

impl DriftPolicy {
    pub fn new(materiality_threshold: Decimal) -> Self {
        Self {
            materiality_threshold,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.reconcile.materiality_threshold)
    }
}

/// Closing drift for one day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub date: NaiveDate,
    /// `official_closing_nav - calculated_closing_nav`, unrounded.
    pub drift: Decimal,
    pub action: DriftAction,
    pub explanations: Vec<DriftExplanation>,
    /// Drift left after every quantified explanation.
    pub unexplained: Decimal,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.action == DriftAction::Clean
    }
}

/// Opening checkpoint divergence. Informational: the opening figures are
/// not escalated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningReport {
    pub date: NaiveDate,
    pub official: Option<Decimal>,
    pub calculated: Decimal,
    /// `official - calculated`; `None` when no official opening figure was
    /// published.
    pub divergence: Option<Decimal>,
    pub explanations: Vec<DriftExplanation>,
}
