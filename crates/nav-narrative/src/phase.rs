use serde::{Deserialize, Serialize};

use crate::NarrativeError;

/// Per-day narrative phase. Strictly forward, one step at a time.
///
/// ```text
/// PreMarket ──► MarketOpen ──► Intraday ──► MarketClose ──► Reconciled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayPhase {
    PreMarket,
    MarketOpen,
    Intraday,
    MarketClose,
    Reconciled,
}

impl DayPhase {
    pub fn next(self) -> Option<DayPhase> {
        match self {
            DayPhase::PreMarket => Some(DayPhase::MarketOpen),
            DayPhase::MarketOpen => Some(DayPhase::Intraday),
            DayPhase::Intraday => Some(DayPhase::MarketClose),
            DayPhase::MarketClose => Some(DayPhase::Reconciled),
            DayPhase::Reconciled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPhase::PreMarket => "PRE_MARKET",
            DayPhase::MarketOpen => "MARKET_OPEN",
            DayPhase::Intraday => "INTRADAY",
            DayPhase::MarketClose => "MARKET_CLOSE",
            DayPhase::Reconciled => "RECONCILED",
        }
    }
}

/// Holds the current phase and refuses anything but the next one.
#[derive(Debug, Clone)]
pub(crate) struct PhaseMachine {
    phase: DayPhase,
}

impl PhaseMachine {
    pub(crate) fn new() -> Self {
        Self {
            phase: DayPhase::PreMarket,
        }
    }

    pub(crate) fn phase(&self) -> DayPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, to: DayPhase) -> Result<(), NarrativeError> {
        if self.phase.next() != Some(to) {
            return Err(NarrativeError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// An event tagged `phase` may only be applied while the machine sits in
    /// that phase.
    pub(crate) fn require(&self, phase: DayPhase, external_id: &str) -> Result<(), NarrativeError> {
        if self.phase != phase {
            return Err(NarrativeError::EventInWrongPhase {
                external_id: external_id.to_string(),
                event_phase: phase,
                current: self.phase,
            });
        }
        Ok(())
    }
}
