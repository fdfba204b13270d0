//! An assignment at one close is covered pre-market the next day by a
//! process that started fresh.
//!
//! GREEN when the overnight P&L is still derived: the assignment reaches
//! the second run only through the persisted carry-over.

use chrono::NaiveDate;
use nav_config::EngineConfig;
use nav_db::{LedgerStore, MemoryLedgerStore};
use nav_narrative::BlockKind;
use nav_runtime::{DailyJob, OfficialNav};
use nav_testkit::{load_report_json, report, stock, trade};
use rust_decimal_macros::dec;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

#[tokio::test]
async fn scenario_carry_over_survives_restart() -> anyhow::Result<()> {
    let cfg = EngineConfig::default();
    let store = MemoryLedgerStore::new(cfg.grace_window());

    {
        let mut job = DailyJob::new(&cfg, &store)?;
        let r = load_report_json("assignment_2024-06-12.json")?;
        let out = job
            .run_daily(
                d(12),
                Some(("DAY:2024-06-12", &r)),
                None,
                OfficialNav {
                    opening: Some(dec!(79754.81)),
                    closing: dec!(79754.81),
                },
                Some(dec!(79754.81)),
            )
            .await?;
        assert_eq!(out.day.narrative.record.reconciliation_delta, dec!(0));
    }

    let persisted = store.load_carry_over(d(13)).await?.unwrap();
    assert_eq!(persisted.as_of, Some(d(12)));
    assert_eq!(persisted.assignments.len(), 1);

    let mut restarted = DailyJob::new(&cfg, &store)?;
    let cover = report(
        d(13),
        d(13),
        vec![trade("T-100", "2024-06-13T12:00:00Z", stock("SPY"), "100", "629.45", "-1.00")],
    );
    let out = restarted
        .run_daily(
            d(13),
            Some(("DAY:2024-06-13", &cover)),
            None,
            OfficialNav {
                opening: Some(dec!(79754.81)),
                closing: dec!(79639.83),
            },
            None,
        )
        .await?;

    let n = &out.day.narrative;
    assert_eq!(n.blocks[0].kind, BlockKind::AssignmentCover);
    assert_eq!(n.stats.overnight_pnl, dec!(-146.00));
    assert_eq!(n.record.calculated_opening_nav, dec!(79608.81));
    assert_eq!(n.record.reconciliation_delta, dec!(31.02));
    assert!(store.load_carry_over(d(14)).await?.unwrap().assignments.is_empty());
    Ok(())
}
