//! Offline import of a CSV statement export.
//!
//! ## Column contract (header row required, order-independent)
//!
//! | Column             | Used by           | Notes                              |
//! |--------------------|-------------------|------------------------------------|
//! | `record_type`      | all               | `trade` / `cash` / `book`          |
//! | `external_id`      | all               | required, unique                   |
//! | `timestamp`        | all               | as in the JSON report              |
//! | `asset_class`      | trade, book       | `STK` / `OPT` / ...                |
//! | `symbol`, `underlying`, `strike`, `right`, `expiry`, `multiplier` | trade, book | |
//! | `quantity`, `price`| trade, book       | decimal strings                    |
//! | `commission`, `net_cash`, `realized_pnl` | trade, book | optional          |
//! | `amount`, `transaction_type` | cash    | `amount` may be empty              |
//! | `currency`, `fx_rate`, `description` | all | optional                      |
//!
//! Empty cells read as absent. Values stay strings: the classifier parses.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use nav_schemas::{RawBookEntry, RawCashTransaction, RawInstrument, RawRecord, RawReport, RawTrade};

use crate::ReportPeriod;

#[derive(Debug, Deserialize)]
struct CsvStatementRow {
    record_type: String,
    external_id: String,
    timestamp: String,
    #[serde(default)]
    asset_class: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    underlying: Option<String>,
    #[serde(default)]
    strike: Option<String>,
    #[serde(default)]
    right: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
    #[serde(default)]
    multiplier: Option<String>,
    #[serde(default)]
    quantity: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    commission: Option<String>,
    #[serde(default)]
    net_cash: Option<String>,
    #[serde(default)]
    realized_pnl: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    transaction_type: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    fx_rate: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl CsvStatementRow {
    fn instrument(&self) -> RawInstrument {
        RawInstrument {
            asset_class: self.asset_class.clone(),
            symbol: self.symbol.clone().unwrap_or_default(),
            underlying: self.underlying.clone(),
            strike: self.strike.clone(),
            right: self.right.clone(),
            expiry: self.expiry.clone(),
            multiplier: self.multiplier.clone(),
        }
    }

    fn into_record(self, row: usize) -> Result<RawRecord> {
        match self.record_type.trim().to_ascii_lowercase().as_str() {
            "trade" => {
                let instrument = self.instrument();
                let quantity = self
                    .quantity
                    .with_context(|| format!("csv row {row}: trade without quantity"))?;
                let price = self
                    .price
                    .with_context(|| format!("csv row {row}: trade without price"))?;
                Ok(RawRecord::Trade(RawTrade {
                    external_id: self.external_id,
                    timestamp: self.timestamp,
                    instrument,
                    quantity,
                    price,
                    commission: self.commission,
                    currency: self.currency,
                    fx_rate: self.fx_rate,
                    net_cash: self.net_cash,
                    realized_pnl: self.realized_pnl,
                    description: self.description,
                }))
            }
            "cash" => Ok(RawRecord::Cash(RawCashTransaction {
                external_id: self.external_id,
                timestamp: self.timestamp,
                currency: self.currency,
                amount: self.amount,
                fx_rate: self.fx_rate,
                transaction_type: self.transaction_type,
                description: self.description,
            })),
            "book" => {
                let instrument = self.instrument();
                let quantity = self
                    .quantity
                    .with_context(|| format!("csv row {row}: book entry without quantity"))?;
                Ok(RawRecord::Book(RawBookEntry {
                    external_id: self.external_id,
                    timestamp: self.timestamp,
                    instrument,
                    quantity,
                    price: self.price,
                    cash_impact: self.net_cash.or(self.amount),
                    realized_pnl: self.realized_pnl,
                    currency: self.currency,
                    fx_rate: self.fx_rate,
                    description: self.description,
                }))
            }
            other => bail!("csv row {row}: unknown record_type '{other}'"),
        }
    }
}

pub fn read_report_csv(path: &Path, account_id: &str, period: &ReportPeriod) -> Result<RawReport> {
    let rdr = csv::Reader::from_path(path)
        .with_context(|| format!("open statement csv: {}", path.display()))?;
    collect(rdr, account_id, period)
        .with_context(|| format!("parse statement csv: {}", path.display()))
}

/// Same as [`read_report_csv`] over in-memory text.
pub fn parse_report_csv_str(src: &str, account_id: &str, period: &ReportPeriod) -> Result<RawReport> {
    collect(csv::Reader::from_reader(src.as_bytes()), account_id, period)
}

fn collect<R: std::io::Read>(
    mut rdr: csv::Reader<R>,
    account_id: &str,
    period: &ReportPeriod,
) -> Result<RawReport> {
    let mut records = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for (i, rec) in rdr.deserialize::<CsvStatementRow>().enumerate() {
        // Header is row 1.
        let row = i + 2;
        let rec = rec.with_context(|| format!("csv row {row}: decode failed"))?;
        if rec.external_id.trim().is_empty() {
            bail!("csv row {row}: empty external_id");
        }
        if !seen.insert(rec.external_id.clone()) {
            bail!("csv row {row}: duplicate external_id {}", rec.external_id);
        }
        records.push(rec.into_record(row)?);
    }

    Ok(RawReport {
        account_id: account_id.to_string(),
        period_start: period.start,
        period_end: period.end,
        records,
    })
}
