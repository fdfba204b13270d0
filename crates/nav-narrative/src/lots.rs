//! FIFO option premium lots.
//!
//! Opening option trades park their net premium here; closing trades and
//! expirations consume lots first-in first-out and realize the premium. This
//! is what lets an expiration narrate "premium retained" with a realized
//! figure even when the source omits one.

use rust_decimal::Decimal;

use nav_schemas::{LedgerEvent, OptionContract, OptionLot};

/// Result of consuming lots against one closing event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotClose {
    pub closed_quantity: i64,
    /// Premium of the consumed lot portions plus the closing cash share,
    /// each converted at its own event's rate.
    pub realized_reporting: Decimal,
    /// `external_id`s of the lots touched, FIFO.
    pub lot_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionTradeEffect {
    pub close: LotClose,
    /// Contracts left over that opened a new lot.
    pub opened_quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotBook {
    lots: Vec<OptionLot>,
}

impl LotBook {
    pub fn from_lots(lots: Vec<OptionLot>) -> Self {
        Self { lots }
    }

    pub fn lots(&self) -> &[OptionLot] {
        &self.lots
    }

    pub fn into_lots(self) -> Vec<OptionLot> {
        self.lots
    }

    /// Consume up to `quantity` contracts of `contract` from lots accepted by
    /// `matches`, FIFO. Returns the closed quantity and realized premium.
    fn consume(
        &mut self,
        contract: &OptionContract,
        quantity: i64,
        matches: impl Fn(&OptionLot) -> bool,
    ) -> LotClose {
        let mut out = LotClose::default();
        let mut remaining = quantity;
        for lot in self
            .lots
            .iter_mut()
            .filter(|l| &l.contract == contract && matches(l))
        {
            if remaining == 0 {
                break;
            }
            let size = lot.signed_quantity.abs();
            let take = remaining.min(size);
            let share = lot.net_premium_local * Decimal::from(take) / Decimal::from(size);
            out.realized_reporting += share * lot.fx_rate;
            lot.net_premium_local -= share;
            lot.signed_quantity -= take * lot.signed_quantity.signum();
            remaining -= take;
            out.closed_quantity += take;
            out.lot_ids.push(lot.external_id.clone());
        }
        self.lots.retain(|l| l.signed_quantity != 0);
        out
    }

    /// Apply an option trade: close opposite-signed lots first, open a lot
    /// with whatever is left.
    pub fn apply_trade(&mut self, ev: &LedgerEvent, contract: &OptionContract) -> OptionTradeEffect {
        if ev.quantity == 0 {
            return OptionTradeEffect::default();
        }
        let sign = ev.quantity.signum();
        let total = ev.quantity.abs();
        let cash = ev.cash_impact_local.unwrap_or(Decimal::ZERO);

        let mut close = self.consume(contract, total, |l| l.signed_quantity.signum() == -sign);
        if close.closed_quantity > 0 {
            let closing_cash = cash * Decimal::from(close.closed_quantity) / Decimal::from(total);
            close.realized_reporting += closing_cash * ev.fx_rate;
        }

        let opened = total - close.closed_quantity;
        if opened > 0 {
            self.lots.push(OptionLot {
                contract: contract.clone(),
                signed_quantity: opened * sign,
                net_premium_local: cash * Decimal::from(opened) / Decimal::from(total),
                fx_rate: ev.fx_rate,
                opened_at: ev.timestamp,
                external_id: ev.external_id.clone(),
            });
        }
        OptionTradeEffect {
            close,
            opened_quantity: opened,
        }
    }

    /// Close lots of an expiring contract. A zero quantity expires every lot
    /// of the contract.
    pub fn expire(&mut self, ev: &LedgerEvent, contract: &OptionContract) -> LotClose {
        let quantity = if ev.quantity == 0 {
            self.lots
                .iter()
                .filter(|l| &l.contract == contract)
                .map(|l| l.signed_quantity.abs())
                .sum()
        } else {
            ev.quantity.abs()
        };
        let mut close = self.consume(contract, quantity, |_| true);
        let cash = ev.cash_impact_local.unwrap_or(Decimal::ZERO);
        close.realized_reporting += cash * ev.fx_rate;
        close
    }
}
