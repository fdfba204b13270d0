use std::collections::BTreeSet;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use nav_config::{EngineConfig, FxConfig, FxSource};
use nav_schemas::{
    sort_events, EventFlag, EventKind, EventSource, Instrument, LedgerEvent, RawBookEntry,
    RawCashTransaction, RawRecord, RawTrade,
};

use crate::parse;
use crate::{classify_book_entry, BookEntryClass, ClassificationIssue, ClassifyError};

/// Everything the classifier needs besides the record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyContext {
    pub source: EventSource,
    /// Timezone used for exchange-local timestamps without an offset.
    pub exchange_tz: Tz,
    pub reporting_currency: String,
    pub fx: FxConfig,
}

impl ClassifyContext {
    pub fn new(source: EventSource, cfg: &EngineConfig) -> Self {
        Self {
            source,
            exchange_tz: cfg.calendar.exchange_tz,
            reporting_currency: cfg.reporting_currency.trim().to_ascii_uppercase(),
            fx: cfg.fx.clone(),
        }
    }

    pub fn historical(cfg: &EngineConfig) -> Self {
        Self::new(EventSource::HistoricalReport, cfg)
    }

    pub fn live(cfg: &EngineConfig) -> Self {
        Self::new(EventSource::LiveSession, cfg)
    }

    /// Local → reporting rate for one record.
    ///
    /// `fixed`: always the configured rate. `event`: the record's own rate,
    /// else 1 for reporting-currency records, else the configured rate.
    fn fx_rate(&self, external_id: &str, currency: &str, raw: Option<&str>) -> Result<Decimal, ClassifyError> {
        match self.fx.source {
            FxSource::Fixed => Ok(self.fx.rate),
            FxSource::Event => match parse::opt_decimal(external_id, "fx_rate", raw)? {
                Some(r) if r > Decimal::ZERO => Ok(r),
                Some(_) => Err(ClassifyError::InvalidDecimal {
                    external_id: external_id.to_string(),
                    field: "fx_rate",
                    raw: raw.unwrap_or_default().to_string(),
                }),
                None if currency == self.reporting_currency => Ok(Decimal::ONE),
                None => Ok(self.fx.rate),
            },
        }
    }

    fn currency(&self, raw: Option<&str>) -> String {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| self.reporting_currency.clone())
    }
}

/// A classified event plus any non-fatal findings about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub event: LedgerEvent,
    pub issues: Vec<ClassificationIssue>,
}

/// The single classification entry point: one raw record in, one tagged
/// event out.
pub fn classify(raw: &RawRecord, ctx: &ClassifyContext) -> Result<Classified, ClassifyError> {
    if raw.external_id().trim().is_empty() {
        return Err(ClassifyError::EmptyExternalId {
            record_type: raw.record_type(),
        });
    }
    match raw {
        RawRecord::Trade(t) => classify_trade(t, ctx),
        RawRecord::Cash(c) => classify_cash(c, ctx),
        RawRecord::Book(b) => classify_book(b, ctx),
    }
}

fn classify_trade(t: &RawTrade, ctx: &ClassifyContext) -> Result<Classified, ClassifyError> {
    let id = t.external_id.trim();
    let timestamp = parse::timestamp(id, &t.timestamp, ctx.exchange_tz)?;
    let instrument = parse::instrument(id, &t.instrument)?;
    let quantity = parse::quantity(id, &t.quantity)?;
    let price = parse::decimal(id, "price", &t.price)?;
    // Sources disagree on the sign of commissions; store the magnitude.
    let commission = parse::opt_decimal(id, "commission", t.commission.as_deref())?
        .unwrap_or(Decimal::ZERO)
        .abs();
    let currency = ctx.currency(t.currency.as_deref());
    let fx_rate = ctx.fx_rate(id, &currency, t.fx_rate.as_deref())?;

    let multiplier = instrument.option().map(|c| c.multiplier).unwrap_or(1);
    let computed = -(Decimal::from(quantity) * price * Decimal::from(multiplier)) - commission;
    let cash_local = parse::opt_decimal(id, "net_cash", t.net_cash.as_deref())?.unwrap_or(computed);
    let realized_pnl = parse::opt_decimal(id, "realized_pnl", t.realized_pnl.as_deref())?;

    Ok(Classified {
        event: LedgerEvent {
            external_id: id.to_string(),
            timestamp,
            source_tz: ctx.exchange_tz,
            kind: EventKind::Trade,
            instrument,
            quantity,
            price,
            commission,
            currency,
            fx_rate,
            cash_impact_local: Some(cash_local),
            cash_impact_reporting_ccy: Some(cash_local * fx_rate),
            realized_pnl,
            source: ctx.source,
            flags: BTreeSet::new(),
            description: t.description.clone().unwrap_or_default(),
        },
        issues: Vec::new(),
    })
}

fn classify_cash(c: &RawCashTransaction, ctx: &ClassifyContext) -> Result<Classified, ClassifyError> {
    let id = c.external_id.trim();
    let timestamp = parse::timestamp(id, &c.timestamp, ctx.exchange_tz)?;
    let currency = ctx.currency(c.currency.as_deref());
    let fx_rate = ctx.fx_rate(id, &currency, c.fx_rate.as_deref())?;
    let amount = parse::opt_decimal(id, "amount", c.amount.as_deref())?;

    let mut flags = BTreeSet::new();
    let mut issues = Vec::new();
    if amount.is_none() {
        warn!(external_id = %id, "cash transaction without amount; stored flagged with no value");
        flags.insert(EventFlag::MissingAmount);
        issues.push(ClassificationIssue::MissingAmountData {
            external_id: id.to_string(),
        });
    }

    let description = [c.transaction_type.as_deref(), c.description.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(": ");

    Ok(Classified {
        event: LedgerEvent {
            external_id: id.to_string(),
            timestamp,
            source_tz: ctx.exchange_tz,
            kind: EventKind::CashTransaction,
            instrument: Instrument::Cash {
                currency: currency.clone(),
            },
            quantity: 0,
            price: Decimal::ZERO,
            commission: Decimal::ZERO,
            currency,
            fx_rate,
            cash_impact_local: amount,
            cash_impact_reporting_ccy: amount.map(|a| a * fx_rate),
            realized_pnl: None,
            source: ctx.source,
            flags,
            description,
        },
        issues,
    })
}

fn classify_book(b: &RawBookEntry, ctx: &ClassifyContext) -> Result<Classified, ClassifyError> {
    let id = b.external_id.trim();
    let timestamp = parse::timestamp(id, &b.timestamp, ctx.exchange_tz)?;
    let quantity = parse::quantity(id, &b.quantity)?;
    let currency = ctx.currency(b.currency.as_deref());
    let fx_rate = ctx.fx_rate(id, &currency, b.fx_rate.as_deref())?;
    let realized_pnl = parse::opt_decimal(id, "realized_pnl", b.realized_pnl.as_deref())?;
    let description = b.description.clone().unwrap_or_default();

    let mut flags = BTreeSet::new();
    let mut issues = Vec::new();

    let class = classify_book_entry(&b.instrument);
    debug!(external_id = %id, ?class, "book entry classified");

    let (kind, instrument, price, cash_local, realized_pnl) = match class {
        BookEntryClass::Expiration => {
            let instrument = parse::instrument(id, &b.instrument)?;
            let price = parse::opt_decimal(id, "price", b.price.as_deref())?.unwrap_or(Decimal::ZERO);
            let cash = parse::opt_decimal(id, "cash_impact", b.cash_impact.as_deref())?
                .unwrap_or(Decimal::ZERO);
            (EventKind::Expiration, instrument, price, Some(cash), realized_pnl)
        }
        BookEntryClass::Assignment => {
            let instrument = parse::instrument(id, &b.instrument)?;
            // The assignment price is the option strike; overnight P&L needs it.
            let price = parse::decimal(id, "price", b.price.as_deref().unwrap_or_default())?;
            let raw_cash = b.cash_impact.as_deref().map(str::trim).filter(|s| !s.is_empty());
            let spurious = match raw_cash {
                None => false,
                Some(s) => parse::decimal(id, "cash_impact", s)
                    .map(|v| !v.is_zero())
                    .unwrap_or(true),
            };
            if spurious {
                warn!(
                    external_id = %id,
                    raw_cash_impact = raw_cash.unwrap_or_default(),
                    "assignment reported nonzero cash impact; overridden to zero"
                );
                flags.insert(EventFlag::SpuriousAssignmentCashOverridden);
            }
            // Assignments are asset swaps: never cash, never realized P&L.
            (EventKind::Assignment, instrument, price, Some(Decimal::ZERO), None)
        }
        BookEntryClass::Ambiguous => {
            let reason = format!(
                "book entry instrument '{}' (asset class {:?}) is neither an option nor an equity",
                b.instrument.symbol,
                b.instrument.asset_class.as_deref().unwrap_or("missing")
            );
            warn!(external_id = %id, reason = %reason, "classification ambiguity; stored unclassified");
            flags.insert(EventFlag::AmbiguousClassification);
            issues.push(ClassificationIssue::ClassificationAmbiguity {
                external_id: id.to_string(),
                reason,
            });
            let instrument = parse::instrument(id, &b.instrument).unwrap_or_else(|_| {
                let symbol = b.instrument.symbol.trim();
                Instrument::equity(if symbol.is_empty() { "UNKNOWN" } else { symbol })
            });
            let price = parse::opt_decimal(id, "price", b.price.as_deref())?.unwrap_or(Decimal::ZERO);
            let cash = parse::opt_decimal(id, "cash_impact", b.cash_impact.as_deref())?;
            (EventKind::Unclassified, instrument, price, cash, realized_pnl)
        }
    };

    Ok(Classified {
        event: LedgerEvent {
            external_id: id.to_string(),
            timestamp,
            source_tz: ctx.exchange_tz,
            kind,
            instrument,
            quantity,
            price,
            commission: Decimal::ZERO,
            currency,
            fx_rate,
            cash_impact_local: cash_local,
            cash_impact_reporting_ccy: cash_local.map(|c| c * fx_rate),
            realized_pnl,
            source: ctx.source,
            flags,
            description,
        },
        issues,
    })
}

/// A record the classifier refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub external_id: String,
    pub error: ClassifyError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Classified events in `(timestamp, external_id)` order.
    pub events: Vec<LedgerEvent>,
    pub issues: Vec<ClassificationIssue>,
    pub rejected: Vec<RejectedRecord>,
}

impl BatchOutcome {
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// Classify every record. A malformed record is rejected on its own; it
/// never aborts the batch.
pub fn classify_batch(records: &[RawRecord], ctx: &ClassifyContext) -> BatchOutcome {
    let mut out = BatchOutcome::default();
    for raw in records {
        match classify(raw, ctx) {
            Ok(c) => {
                out.issues.extend(c.issues);
                out.events.push(c.event);
            }
            Err(error) => {
                warn!(external_id = %raw.external_id(), error = %error, "raw record rejected");
                out.rejected.push(RejectedRecord {
                    external_id: raw.external_id().to_string(),
                    error,
                });
            }
        }
    }
    sort_events(&mut out.events);
    out
}
