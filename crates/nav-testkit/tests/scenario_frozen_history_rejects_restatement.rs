//! A restated report arrives long after the grace window closed.
//!
//! GREEN when:
//! - the stored row keeps its original values,
//! - the refusal is written to the audit trail and the chain verifies,
//! - the day's reconciliation is unaffected.

use chrono::NaiveDate;
use nav_audit::{verify_hash_chain, AuditWriter};
use nav_config::EngineConfig;
use nav_db::{LedgerStore, MemoryLedgerStore};
use nav_runtime::{DailyJob, OfficialNav};
use nav_testkit::{report, stock, trade};
use rust_decimal_macros::dec;

#[tokio::test]
async fn scenario_frozen_history_rejects_restatement() -> anyhow::Result<()> {
    let d12 = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
    let dir = tempfile::tempdir()?;
    let audit_path = dir.path().join("nav_audit.jsonl");

    let cfg = EngineConfig::default();
    let store = MemoryLedgerStore::new(cfg.grace_window());
    let mut job = DailyJob::new(&cfg, &store)?.with_audit(AuditWriter::new(&audit_path, true)?);

    let original = report(
        d12,
        d12,
        vec![trade("T-1", "2024-06-12T14:00:00Z", stock("SPY"), "10", "540.00", "-1.00")],
    );
    let officials = OfficialNav {
        opening: None,
        closing: dec!(50000.00),
    };
    let before = job
        .run_daily(d12, Some(("DAY:2024-06-12", &original)), None, officials, Some(dec!(50000.00)))
        .await?;

    let restated = report(
        d12,
        d12,
        vec![trade("T-1", "2024-06-12T14:00:00Z", stock("SPY"), "10", "540.00", "-2.50")],
    );
    let ingest = job.ingest_report("DAY:2024-06-12", &restated).await?;
    assert_eq!(ingest.upsert.rejected_frozen, 1);
    assert!(ingest
        .upsert
        .frozen_rejections
        .iter()
        .any(|(id, field)| id == "T-1" && field == "commission"));

    let stored = store.event("T-1").await?.unwrap();
    assert_eq!(stored.commission, dec!(1.00));

    let after = job.narrate(d12, officials, Some(dec!(50000.00))).await?;
    assert_eq!(after.narrative.record, before.day.narrative.record);

    assert!(verify_hash_chain(&audit_path)?.is_valid());
    let log = std::fs::read_to_string(&audit_path)?;
    assert!(log.contains("FROZEN_RESTATEMENT_REJECTED"));
    Ok(())
}
