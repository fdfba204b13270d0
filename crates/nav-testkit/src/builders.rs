//! Raw record builders. Values are strings, exactly as a report delivers them.

use chrono::NaiveDate;
use nav_schemas::{
    RawBookEntry, RawCashTransaction, RawInstrument, RawRecord, RawReport, RawTrade,
};

pub fn stock(symbol: &str) -> RawInstrument {
    RawInstrument {
        asset_class: Some("STK".to_string()),
        symbol: symbol.to_string(),
        ..RawInstrument::default()
    }
}

/// Standard 100-share option. `right` is `C` or `P`; `expiry` is `YYYY-MM-DD`.
pub fn option(underlying: &str, strike: &str, right: &str, expiry: &str) -> RawInstrument {
    RawInstrument {
        asset_class: Some("OPT".to_string()),
        symbol: format!("{underlying} {expiry} {strike}{right}"),
        underlying: Some(underlying.to_string()),
        strike: Some(strike.to_string()),
        right: Some(right.to_string()),
        expiry: Some(expiry.to_string()),
        multiplier: Some("100".to_string()),
    }
}

pub fn trade(
    id: &str,
    ts: &str,
    instrument: RawInstrument,
    quantity: &str,
    price: &str,
    commission: &str,
) -> RawRecord {
    RawRecord::Trade(RawTrade {
        external_id: id.to_string(),
        timestamp: ts.to_string(),
        instrument,
        quantity: quantity.to_string(),
        price: price.to_string(),
        commission: Some(commission.to_string()),
        currency: Some("USD".to_string()),
        fx_rate: None,
        net_cash: None,
        realized_pnl: None,
        description: None,
    })
}

/// Stock delivered by an assignment at `strike`. The source often reports a
/// bogus cash figure here; it is passed through to be overridden.
pub fn assignment(id: &str, ts: &str, symbol: &str, quantity: &str, strike: &str) -> RawRecord {
    RawRecord::Book(RawBookEntry {
        external_id: id.to_string(),
        timestamp: ts.to_string(),
        instrument: stock(symbol),
        quantity: quantity.to_string(),
        price: Some(strike.to_string()),
        cash_impact: Some("0".to_string()),
        realized_pnl: None,
        currency: Some("USD".to_string()),
        fx_rate: None,
        description: Some(format!("Assigned {symbol} {strike}")),
    })
}

pub fn expiration(id: &str, ts: &str, instrument: RawInstrument, quantity: &str) -> RawRecord {
    RawRecord::Book(RawBookEntry {
        external_id: id.to_string(),
        timestamp: ts.to_string(),
        instrument,
        quantity: quantity.to_string(),
        price: None,
        cash_impact: None,
        realized_pnl: None,
        currency: Some("USD".to_string()),
        fx_rate: None,
        description: Some("Expired".to_string()),
    })
}

/// `amount = None` reproduces the upstream path that drops the figure.
pub fn cash(id: &str, ts: &str, amount: Option<&str>, transaction_type: &str) -> RawRecord {
    RawRecord::Cash(RawCashTransaction {
        external_id: id.to_string(),
        timestamp: ts.to_string(),
        currency: Some("USD".to_string()),
        amount: amount.map(str::to_string),
        fx_rate: None,
        transaction_type: Some(transaction_type.to_string()),
        description: None,
    })
}

pub fn report(start: NaiveDate, end: NaiveDate, records: Vec<RawRecord>) -> RawReport {
    RawReport {
        account_id: "U1234567".to_string(),
        period_start: start,
        period_end: end,
        records,
    }
}
