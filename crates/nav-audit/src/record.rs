use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use nav_schemas::EventCorrection;

/// Typed audit payloads. `topic()` groups them in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum AuditRecord {
    /// An in-place change to a stored ledger event.
    Correction(EventCorrection),
    /// A provisional live event removed because a historical import now
    /// covers its period.
    LiveSuperseded {
        external_id: String,
        period_start: NaiveDate,
        period_end: NaiveDate,
    },
    /// A same-source change outside the grace window, refused.
    FrozenRestatementRejected { external_id: String, field: String },
    /// A report period applied to the ledger.
    ImportApplied {
        period_key: String,
        report_digest: String,
        inserted: u64,
        updated: u64,
        unchanged: u64,
    },
    /// Drift above the materiality threshold.
    DriftEscalated {
        date: NaiveDate,
        drift: Decimal,
        threshold: Decimal,
        unexplained: Decimal,
    },
    FetchFailed {
        period_key: String,
        retryable: bool,
        message: String,
    },
}

impl AuditRecord {
    pub fn topic(&self) -> &'static str {
        match self {
            AuditRecord::Correction(_)
            | AuditRecord::LiveSuperseded { .. }
            | AuditRecord::FrozenRestatementRejected { .. }
            | AuditRecord::ImportApplied { .. } => "LEDGER",
            AuditRecord::DriftEscalated { .. } => "RECONCILE",
            AuditRecord::FetchFailed { .. } => "FETCH",
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            AuditRecord::Correction(_) => "EVENT_CORRECTED",
            AuditRecord::LiveSuperseded { .. } => "LIVE_SUPERSEDED",
            AuditRecord::FrozenRestatementRejected { .. } => "FROZEN_RESTATEMENT_REJECTED",
            AuditRecord::ImportApplied { .. } => "IMPORT_APPLIED",
            AuditRecord::DriftEscalated { .. } => "DRIFT_ESCALATED",
            AuditRecord::FetchFailed { .. } => "FETCH_FAILED",
        }
    }

    pub fn payload(&self) -> Result<Value> {
        serde_json::to_value(self).context("serialize audit record")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn escalation_payload_keeps_exact_decimals() {
        let rec = AuditRecord::DriftEscalated {
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            drift: dec!(-131.02),
            threshold: dec!(50.00),
            unexplained: dec!(-131.02),
        };
        let v = rec.payload().unwrap();
        assert_eq!(v["record"], "drift_escalated");
        assert_eq!(v["drift"], "-131.02");
        assert_eq!(rec.topic(), "RECONCILE");
    }
}
