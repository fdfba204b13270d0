use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Kind / source / flags
// ---------------------------------------------------------------------------

/// Canonical event kind.
///
/// `Assignment` and `Expiration` are never supplied by a source: the
/// classifier derives them from generic book entries. `Unclassified` holds
/// records that matched neither branch of that rule; they are stored and
/// flagged rather than dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Trade,
    Assignment,
    Expiration,
    CashTransaction,
    Unclassified,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Trade => "TRADE",
            EventKind::Assignment => "ASSIGNMENT",
            EventKind::Expiration => "EXPIRATION",
            EventKind::CashTransaction => "CASH_TRANSACTION",
            EventKind::Unclassified => "UNCLASSIFIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TRADE" => Some(EventKind::Trade),
            "ASSIGNMENT" => Some(EventKind::Assignment),
            "EXPIRATION" => Some(EventKind::Expiration),
            "CASH_TRANSACTION" => Some(EventKind::CashTransaction),
            "UNCLASSIFIED" => Some(EventKind::Unclassified),
            _ => None,
        }
    }
}

/// Where an event came from. Determines its mutability window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    /// Settled (T+1) broker report. Frozen once past the grace window.
    HistoricalReport,
    /// Same-day broker session data. Provisional; superseded by the next
    /// historical import covering the same period.
    LiveSession,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::HistoricalReport => "HISTORICAL_REPORT",
            EventSource::LiveSession => "LIVE_SESSION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HISTORICAL_REPORT" => Some(EventSource::HistoricalReport),
            "LIVE_SESSION" => Some(EventSource::LiveSession),
            _ => None,
        }
    }
}

/// Data-quality markers carried by an event so that downstream
/// reconciliation can explain (not hide) the drift they cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventFlag {
    /// Upstream omitted the transaction amount; stored as `None`.
    MissingAmount,
    /// Book entry matched neither the option nor the equity branch.
    AmbiguousClassification,
    /// Upstream reported a nonzero cash impact on an assignment; zeroed.
    SpuriousAssignmentCashOverridden,
}

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    pub fn as_char(&self) -> char {
        match self {
            OptionRight::Call => 'C',
            OptionRight::Put => 'P',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub strike: Decimal,
    pub right: OptionRight,
    pub expiry: NaiveDate,
    pub multiplier: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instrument {
    Equity { symbol: String },
    Option(OptionContract),
    /// Pure cash movement (deposit, withdrawal, fee, interest).
    Cash { currency: String },
}

impl Instrument {
    pub fn equity(symbol: impl Into<String>) -> Self {
        Instrument::Equity {
            symbol: symbol.into(),
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, Instrument::Option(_))
    }

    pub fn is_equity(&self) -> bool {
        matches!(self, Instrument::Equity { .. })
    }

    /// Underlying symbol for equities and options; currency code for cash.
    pub fn underlying(&self) -> &str {
        match self {
            Instrument::Equity { symbol } => symbol,
            Instrument::Option(c) => &c.underlying,
            Instrument::Cash { currency } => currency,
        }
    }

    pub fn option(&self) -> Option<&OptionContract> {
        match self {
            Instrument::Option(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Equity { symbol } => write!(f, "{symbol}"),
            Instrument::Option(c) => write!(
                f,
                "{} {} {}{}",
                c.underlying,
                c.expiry.format("%Y-%m-%d"),
                c.strike.normalize(),
                c.right.as_char()
            ),
            Instrument::Cash { currency } => write!(f, "CASH.{currency}"),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerEvent
// ---------------------------------------------------------------------------

/// Immutable fact about account activity.
///
/// Written once (upsert on `external_id`) and read many times. Amounts are in
/// the source currency; `fx_rate` converts them to the reporting currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub external_id: String,
    pub timestamp: DateTime<Utc>,
    /// Exchange-local timezone of the source.
    pub source_tz: Tz,
    pub kind: EventKind,
    pub instrument: Instrument,
    /// Signed: positive buys/receives, negative sells/delivers.
    pub quantity: i64,
    pub price: Decimal,
    /// Non-negative magnitude.
    pub commission: Decimal,
    pub currency: String,
    pub fx_rate: Decimal,
    pub cash_impact_local: Option<Decimal>,
    pub cash_impact_reporting_ccy: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub source: EventSource,
    #[serde(default)]
    pub flags: BTreeSet<EventFlag>,
    #[serde(default)]
    pub description: String,
}

impl LedgerEvent {
    /// Timestamp rendered in the source exchange's timezone.
    pub fn local_timestamp(&self) -> DateTime<Tz> {
        self.timestamp.with_timezone(&self.source_tz)
    }

    /// Timestamp rendered in an arbitrary display timezone.
    pub fn timestamp_in(&self, tz: Tz) -> DateTime<Tz> {
        self.timestamp.with_timezone(&tz)
    }

    pub fn has_flag(&self, flag: EventFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_provisional(&self) -> bool {
        self.source == EventSource::LiveSession
    }

    /// Convert a local-currency amount to the reporting currency.
    pub fn to_reporting(&self, local: Decimal) -> Decimal {
        local * self.fx_rate
    }

    pub fn realized_pnl_reporting(&self) -> Option<Decimal> {
        self.realized_pnl.map(|p| self.to_reporting(p))
    }

    pub fn commission_reporting(&self) -> Decimal {
        self.to_reporting(self.commission)
    }

    /// Total ordering used everywhere events are sequenced.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, self.external_id.as_str())
    }
}

/// Sort events into canonical `(timestamp, external_id)` order.
pub fn sort_events(events: &mut [LedgerEvent]) {
    events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
