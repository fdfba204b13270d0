//! Structural validation of a downloaded report body.
//!
//! Only shape is checked here (required fields, date range, unique ids).
//! Field *values* stay strings until the classifier parses them.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use nav_schemas::{RawBookEntry, RawCashTransaction, RawRecord, RawReport, RawTrade};

use crate::FetchError;

#[derive(Debug, Deserialize)]
struct ReportBody {
    account_id: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    #[serde(default)]
    trades: Vec<RawTrade>,
    #[serde(default)]
    cash_transactions: Vec<RawCashTransaction>,
    #[serde(default)]
    book_entries: Vec<RawBookEntry>,
}

/// Validate a downloaded body into a [`RawReport`]. Any deviation is
/// `FetchError::Fatal`: retrying will download the same bytes.
pub fn parse_report(body: Value) -> Result<RawReport, FetchError> {
    let body: ReportBody = serde_json::from_value(body)
        .map_err(|e| FetchError::Fatal(format!("malformed report body: {e}")))?;

    if body.account_id.trim().is_empty() {
        return Err(FetchError::Fatal("malformed report body: empty account_id".to_string()));
    }
    if body.period_start > body.period_end {
        return Err(FetchError::Fatal(format!(
            "malformed report body: period_start {} after period_end {}",
            body.period_start, body.period_end
        )));
    }

    let mut records: Vec<RawRecord> = Vec::with_capacity(
        body.trades.len() + body.cash_transactions.len() + body.book_entries.len(),
    );
    records.extend(body.trades.into_iter().map(RawRecord::Trade));
    records.extend(body.cash_transactions.into_iter().map(RawRecord::Cash));
    records.extend(body.book_entries.into_iter().map(RawRecord::Book));

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for r in &records {
        // Ledger keys are trimmed downstream, so duplicates are judged the same way.
        let id = r.external_id().trim();
        if id.is_empty() {
            return Err(FetchError::Fatal(format!(
                "malformed report body: {} record without external_id",
                r.record_type()
            )));
        }
        if !seen.insert(id) {
            return Err(FetchError::Fatal(format!(
                "malformed report body: duplicate external_id {id}"
            )));
        }
    }

    Ok(RawReport {
        account_id: body.account_id,
        period_start: body.period_start,
        period_end: body.period_end,
        records,
    })
}

/// SHA-256 over the canonical JSON of the report. Stored in the import
/// checkpoint so an unchanged re-download can be recognised.
pub fn report_digest(report: &RawReport) -> String {
    // RawReport contains only structs, strings and Vecs: serialization cannot fail.
    let canonical = serde_json::to_string(report).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "account_id": "U1234567",
            "period_start": "2024-06-01",
            "period_end": "2024-06-12",
            "trades": [{
                "external_id": "T-1",
                "timestamp": "2024-06-12T13:45:00Z",
                "instrument": {"asset_class": "STK", "symbol": "SPY"},
                "quantity": "100",
                "price": "629.45",
                "commission": "-1.00"
            }],
            "cash_transactions": [{
                "external_id": "C-1",
                "timestamp": "2024-06-12T14:00:00Z",
                "amount": "2500.00",
                "transaction_type": "Deposits/Withdrawals"
            }],
            "book_entries": []
        })
    }

    #[test]
    fn well_formed_body_flattens_records() {
        let r = parse_report(body()).unwrap();
        assert_eq!(r.account_id, "U1234567");
        let ids: Vec<&str> = r.records.iter().map(|x| x.external_id()).collect();
        assert_eq!(ids, vec!["T-1", "C-1"]);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let r = parse_report(json!({
            "account_id": "U1",
            "period_start": "2024-06-12",
            "period_end": "2024-06-12"
        }))
        .unwrap();
        assert!(r.records.is_empty());
    }

    #[test]
    fn missing_account_is_fatal() {
        let mut b = body();
        b.as_object_mut().unwrap().remove("account_id");
        assert!(matches!(parse_report(b), Err(FetchError::Fatal(_))));
    }

    #[test]
    fn inverted_period_is_fatal() {
        let mut b = body();
        b["period_start"] = json!("2024-06-30");
        assert!(matches!(parse_report(b), Err(FetchError::Fatal(_))));
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        let mut b = body();
        b["cash_transactions"][0]["external_id"] = json!("T-1");
        let err = parse_report(b).unwrap_err();
        assert!(err.message().contains("duplicate external_id T-1"));
    }

    #[test]
    fn ids_differing_only_by_whitespace_are_duplicates() {
        let mut b = body();
        b["cash_transactions"][0]["external_id"] = json!("T-1 ");
        let err = parse_report(b).unwrap_err();
        assert!(err.message().contains("duplicate external_id T-1"));
    }

    #[test]
    fn digest_changes_with_content() {
        let a = parse_report(body()).unwrap();
        let mut b = a.clone();
        assert_eq!(report_digest(&a), report_digest(&b));
        b.account_id = "U7654321".to_string();
        assert_ne!(report_digest(&a), report_digest(&b));
        assert_eq!(report_digest(&a).len(), 64);
    }
}
