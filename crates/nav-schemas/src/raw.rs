//! Raw wire-level records.
//!
//! These mirror what the broker reporting API and the live session API
//! return. Every numeric field is an optional decimal string: upstream data
//! is untrusted and the classifier is the single boundary that parses and
//! validates it. Unknown fields are ignored so that upstream additions do
//! not break deserialization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Instrument description as delivered by the source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstrument {
    /// `STK`, `OPT`, `CASH`, ... (case-insensitive). May be absent.
    #[serde(default)]
    pub asset_class: Option<String>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub strike: Option<String>,
    /// `C` / `P` / `CALL` / `PUT`.
    #[serde(default)]
    pub right: Option<String>,
    /// `YYYY-MM-DD` or `YYYYMMDD`.
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub multiplier: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTrade {
    pub external_id: String,
    /// RFC 3339, or exchange-local `YYYYMMDD;HHMMSS` / `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub instrument: RawInstrument,
    pub quantity: String,
    pub price: String,
    #[serde(default)]
    pub commission: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub fx_rate: Option<String>,
    #[serde(default)]
    pub net_cash: Option<String>,
    #[serde(default)]
    pub realized_pnl: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCashTransaction {
    pub external_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub currency: Option<String>,
    /// Absent on one upstream reporting path (known data-quality gap).
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub fx_rate: Option<String>,
    /// Deposit / withdrawal / fee / interest / dividend; free text.
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Generic "book" entry. Assignments and expirations both arrive in this
/// shape; only the instrument tells them apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBookEntry {
    pub external_id: String,
    pub timestamp: String,
    pub instrument: RawInstrument,
    pub quantity: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub cash_impact: Option<String>,
    #[serde(default)]
    pub realized_pnl: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub fx_rate: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum RawRecord {
    Trade(RawTrade),
    Cash(RawCashTransaction),
    Book(RawBookEntry),
}

impl RawRecord {
    pub fn external_id(&self) -> &str {
        match self {
            RawRecord::Trade(t) => &t.external_id,
            RawRecord::Cash(c) => &c.external_id,
            RawRecord::Book(b) => &b.external_id,
        }
    }

    pub fn record_type(&self) -> &'static str {
        match self {
            RawRecord::Trade(_) => "trade",
            RawRecord::Cash(_) => "cash",
            RawRecord::Book(_) => "book",
        }
    }
}

/// A downloaded report after structural validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReport {
    pub account_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub records: Vec<RawRecord>,
}
