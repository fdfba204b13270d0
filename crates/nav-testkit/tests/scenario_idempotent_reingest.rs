//! Overlapping month-to-date pulls re-deliver the same rows every day.
//!
//! GREEN when:
//! - a re-delivered row is counted unchanged, never duplicated,
//! - re-narrating an already reconciled day yields the identical record.

use chrono::NaiveDate;
use nav_config::EngineConfig;
use nav_db::{LedgerStore, MemoryLedgerStore};
use nav_runtime::{DailyJob, OfficialNav};
use nav_testkit::{cash, report, stock, trade};
use rust_decimal_macros::dec;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

#[tokio::test]
async fn scenario_overlapping_pulls_do_not_duplicate() -> anyhow::Result<()> {
    let cfg = EngineConfig::default();
    let store = MemoryLedgerStore::new(cfg.grace_window());
    let mut job = DailyJob::new(&cfg, &store)?;

    let day12 = vec![
        trade("T-1", "2024-06-12T14:00:00Z", stock("SPY"), "10", "540.00", "-1.00"),
        cash("C-1", "2024-06-12T16:00:00Z", Some("12.50"), "Dividend"),
    ];
    let mut day13 = day12.clone();
    day13.push(trade("T-2", "2024-06-13T15:00:00Z", stock("SPY"), "-10", "541.00", "-1.00"));

    let officials12 = OfficialNav {
        opening: None,
        closing: dec!(50012.50),
    };
    let first = job
        .run_daily(
            d(12),
            Some(("MTD:2024-06", &report(d(1), d(12), day12))),
            None,
            officials12,
            Some(dec!(50000.00)),
        )
        .await?;
    assert_eq!(first.ingest.as_ref().unwrap().upsert.inserted, 2);

    let second = job
        .run_daily(
            d(13),
            Some(("MTD:2024-06", &report(d(1), d(13), day13))),
            None,
            OfficialNav {
                opening: None,
                closing: dec!(50020.00),
            },
            None,
        )
        .await?;
    let ingest = second.ingest.unwrap();
    assert!(!ingest.skipped_unchanged);
    assert_eq!(ingest.upsert.inserted, 1);
    assert_eq!(ingest.upsert.unchanged, 2);
    assert!(ingest.upsert.corrections.is_empty());
    assert_eq!(store.event_count().await, 3);

    // Day 12 again from the ledger: nothing moved.
    let again = job.narrate(d(12), officials12, Some(dec!(50000.00))).await?;
    assert_eq!(again.narrative.record, first.day.narrative.record);
    assert_eq!(again.drift.drift, first.day.drift.drift);
    assert_eq!(store.nav_record(d(12)).await?.unwrap(), first.day.narrative.record);
    Ok(())
}
