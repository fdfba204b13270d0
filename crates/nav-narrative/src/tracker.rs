//! Open assignment positions and the overnight P&L of their cover trades.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use nav_schemas::{AssignmentPosition, Instrument, LedgerEvent};

/// Outcome of a stock trade that (partly) covered assignment positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverResult {
    pub covered_quantity: i64,
    /// Shares of the trade left over after covering (opening a new position).
    pub remaining_quantity: i64,
    /// `(strike - cover_price) x covered x fx - commission x fx`, sign-flipped
    /// for long (put) assignments. Reporting currency.
    pub overnight_pnl: Decimal,
    /// Strike of the first position covered.
    pub strike: Decimal,
    /// Assignment events fully or partly resolved, FIFO.
    pub resolved: Vec<String>,
}

/// FIFO tracker of stock positions created by option assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentTracker {
    positions: Vec<AssignmentPosition>,
}

impl AssignmentTracker {
    pub fn from_positions(positions: Vec<AssignmentPosition>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[AssignmentPosition] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<AssignmentPosition> {
        self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Track the stock side of an assignment. The event price is the strike.
    pub fn open(&mut self, ev: &LedgerEvent) {
        let Instrument::Equity { symbol } = &ev.instrument else {
            warn!(external_id = %ev.external_id, "assignment without equity instrument; not tracked");
            return;
        };
        if ev.quantity == 0 {
            warn!(external_id = %ev.external_id, "assignment with zero quantity; not tracked");
            return;
        }
        debug!(external_id = %ev.external_id, %symbol, qty = ev.quantity, strike = %ev.price, "assignment opened");
        self.positions.push(AssignmentPosition {
            underlying: symbol.clone(),
            strike: ev.price,
            signed_quantity: ev.quantity,
            opened_at: ev.timestamp,
            source_external_id: ev.external_id.clone(),
        });
    }

    /// Apply a stock trade against open positions on the same underlying with
    /// the opposite sign. `None` when the trade covers nothing.
    pub fn cover(&mut self, ev: &LedgerEvent) -> Option<CoverResult> {
        let Instrument::Equity { symbol } = &ev.instrument else {
            return None;
        };
        if ev.quantity == 0 {
            return None;
        }

        let mut remaining = ev.quantity.abs();
        let mut gross = Decimal::ZERO;
        let mut resolved = Vec::new();
        let mut strike = None;

        for pos in self
            .positions
            .iter_mut()
            .filter(|p| &p.underlying == symbol && p.signed_quantity.signum() == -ev.quantity.signum())
        {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(pos.signed_quantity.abs());
            // Short stock (call assigned) gains when covered below the strike;
            // long stock (put assigned) gains when sold above it.
            let direction = Decimal::from(-pos.signed_quantity.signum());
            gross += (pos.strike - ev.price) * Decimal::from(take) * direction;
            pos.signed_quantity += take * ev.quantity.signum();
            remaining -= take;
            strike.get_or_insert(pos.strike);
            resolved.push(pos.source_external_id.clone());
        }

        let strike = strike?;
        self.positions.retain(|p| p.signed_quantity != 0);

        let covered = ev.quantity.abs() - remaining;
        let overnight_pnl = gross * ev.fx_rate - ev.commission * ev.fx_rate;
        Some(CoverResult {
            covered_quantity: covered,
            remaining_quantity: remaining,
            overnight_pnl,
            strike,
            resolved,
        })
    }
}
