//! Three trading days across a market holiday, one of them with a deposit
//! whose amount the report dropped.
//!
//! GREEN when:
//! - every day's blocks bridge its previous official close to its own,
//! - the day after the holiday starts from the last trading day's close,
//! - the unvalued deposit escalates with the transfer named,
//! - the late amount, once delivered, reconciles the day clean.

use chrono::NaiveDate;
use nav_config::EngineConfig;
use nav_db::{LedgerStore, MemoryLedgerStore};
use nav_reconcile::{DriftAction, DriftExplanation};
use nav_runtime::DailyJob;
use nav_testkit::{cash, check_continuity, report, run_scenario, stock, trade, ScenarioDay};
use rust_decimal_macros::dec;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

#[tokio::test]
async fn scenario_nav_continuity_across_holiday() -> anyhow::Result<()> {
    let cfg = EngineConfig::default();
    let store = MemoryLedgerStore::new(cfg.grace_window());
    let mut job = DailyJob::new(&cfg, &store)?;

    let days = vec![
        ScenarioDay::new(d(17), dec!(100040.00)).with_report(
            "DAY:2024-06-17",
            report(
                d(17),
                d(17),
                vec![trade("T-1", "2024-06-17T14:30:00Z", stock("QQQ"), "20", "480.00", "-1.00")],
            ),
        ),
        ScenarioDay::new(d(18), dec!(101040.00)).with_report(
            "DAY:2024-06-18",
            report(
                d(18),
                d(18),
                vec![cash("C-9", "2024-06-18T15:00:00Z", None, "Deposit")],
            ),
        ),
        // 2024-06-19 is a market holiday.
        ScenarioDay::new(d(20), dec!(100990.00)).with_open(dec!(101040.00)),
    ];

    let out = run_scenario(&mut job, dec!(100000.00), &days).await?;
    check_continuity(dec!(100000.00), &out)?;

    assert_eq!(out[0].day.drift.action, DriftAction::Report);
    assert_eq!(out[2].day.narrative.record.calculated_opening_nav, dec!(101040.00));

    let d18 = &out[1].day.drift;
    assert_eq!(d18.drift, dec!(1000.00));
    assert_eq!(d18.action, DriftAction::Escalate);
    assert!(d18.explanations.iter().any(|e| matches!(
        e,
        DriftExplanation::UnclassifiedCashTransfers { external_ids, .. } if external_ids == &vec!["C-9".to_string()]
    )));

    assert!(job.narrate(d(19), days[1].officials, None).await.is_err());

    // The amount arrives later; the frozen row still accepts it.
    let late = report(
        d(18),
        d(18),
        vec![cash("C-9", "2024-06-18T15:00:00Z", Some("1000.00"), "Deposit")],
    );
    let ingest = job.ingest_report("DAY:2024-06-18", &late).await?;
    assert_eq!(ingest.upsert.updated, 1);
    assert_eq!(store.corrections_for("C-9").await?.len(), 2);

    let redo = job.narrate(d(18), days[1].officials, None).await?;
    assert_eq!(redo.drift.action, DriftAction::Clean);
    assert_eq!(redo.narrative.record.calculated_closing_nav, dec!(101040.00));
    Ok(())
}
