//! Scenario: an assignment at one close, covered pre-market the next day.
//!
//! The assignment itself is NAV-neutral. The cover realizes
//! (strike - cover price) x shares - commission before the open, so the
//! calculated opening NAV sits below the official figure, which has not
//! absorbed the pre-market trade.

use std::collections::BTreeSet;

use chrono::{NaiveDate, TimeZone, Utc};
use nav_calendar::ExchangeCalendar;
use nav_narrative::{BlockKind, DayOfficials, DayPhase, NarrativeEngine};
use nav_schemas::{CarryOverState, EventKind, EventSource, Instrument, LedgerEvent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn stock(id: &str, ts: chrono::DateTime<Utc>, kind: EventKind, qty: i64, price: Decimal, commission: Decimal, cash: Decimal) -> LedgerEvent {
    LedgerEvent {
        external_id: id.to_string(),
        timestamp: ts,
        source_tz: chrono_tz::America::New_York,
        kind,
        instrument: Instrument::equity("SPY"),
        quantity: qty,
        price,
        commission,
        currency: "USD".to_string(),
        fx_rate: dec!(1),
        cash_impact_local: Some(cash),
        cash_impact_reporting_ccy: Some(cash),
        realized_pnl: None,
        source: EventSource::HistoricalReport,
        flags: BTreeSet::new(),
        description: String::new(),
    }
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

#[test]
fn scenario_overnight_cover_moves_calculated_open() {
    let engine = NarrativeEngine::with_default_window(ExchangeCalendar::nyse());

    // Short call assigned at the 2024-06-12 close (16:00 ET = 20:00 UTC).
    let assignment = stock(
        "A-1",
        Utc.with_ymd_and_hms(2024, 6, 12, 20, 0, 0).unwrap(),
        EventKind::Assignment,
        -100,
        dec!(628.00),
        dec!(0),
        dec!(0),
    );
    // Bought back at 08:00 ET on 2024-06-13.
    let cover = stock(
        "T-1",
        Utc.with_ymd_and_hms(2024, 6, 13, 12, 0, 0).unwrap(),
        EventKind::Trade,
        100,
        dec!(629.45),
        dec!(1.00),
        dec!(-62946.00),
    );

    let days = engine
        .run_days(
            dec!(79754.81),
            CarryOverState::default(),
            vec![
                DayOfficials {
                    date: d(12),
                    official_open: Some(dec!(79754.81)),
                    official_close: dec!(79754.81),
                    events: vec![assignment],
                },
                DayOfficials {
                    date: d(13),
                    official_open: Some(dec!(79754.81)),
                    official_close: dec!(79700.00),
                    events: vec![cover],
                },
            ],
        )
        .unwrap();

    let first = &days[0];
    assert_eq!(first.record.reconciliation_delta, dec!(0));
    assert_eq!(first.carry_over.as_of, Some(d(12)));
    assert_eq!(first.carry_over.assignments.len(), 1);
    assert_eq!(first.carry_over.assignments[0].signed_quantity, -100);
    assert!(first
        .blocks
        .iter()
        .any(|b| b.kind == BlockKind::Assignment && b.pnl == dec!(0)));

    let second = &days[1];
    assert_eq!(second.stats.overnight_pnl, dec!(-146.00));
    assert_eq!(second.stats.premarket_event_count, 1);
    assert_eq!(second.record.calculated_opening_nav, dec!(79608.81));
    assert_eq!(second.record.opening_delta(), Some(dec!(146.00)));
    assert!(second.carry_over.assignments.is_empty());
    assert_eq!(second.phase, DayPhase::Reconciled);

    let kinds: Vec<BlockKind> = second.blocks.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::AssignmentCover,
            BlockKind::Opening,
            BlockKind::OpeningDivergence,
            BlockKind::MarkToMarket,
        ]
    );
    assert_eq!(second.blocks[0].phase, DayPhase::PreMarket);
    assert_eq!(second.blocks[0].pnl, dec!(-146.00));
    assert_eq!(second.blocks[1].nav_after, dec!(79608.81));

    // Close: calculated stays at the open, the residual is marked.
    assert_eq!(second.record.calculated_closing_nav, dec!(79608.81));
    assert_eq!(second.record.reconciliation_delta, dec!(91.19));
    assert_eq!(second.blocks[3].pnl, dec!(91.19));
    assert_eq!(second.blocks[3].nav_after, dec!(79700.00));
}

fn in_fx(mut ev: LedgerEvent, fx: Decimal) -> LedgerEvent {
    ev.fx_rate = fx;
    ev.cash_impact_reporting_ccy = ev.cash_impact_local.map(|c| c * fx);
    ev
}

#[test]
fn scenario_overnight_cover_converts_at_the_cover_rate() {
    let engine = NarrativeEngine::with_default_window(ExchangeCalendar::nyse());
    let fx = dec!(0.92);
    let assignment = in_fx(
        stock(
            "A-1",
            Utc.with_ymd_and_hms(2024, 6, 12, 20, 0, 0).unwrap(),
            EventKind::Assignment,
            -100,
            dec!(628.00),
            dec!(0),
            dec!(0),
        ),
        fx,
    );
    let cover = in_fx(
        stock(
            "T-1",
            Utc.with_ymd_and_hms(2024, 6, 13, 12, 0, 0).unwrap(),
            EventKind::Trade,
            100,
            dec!(629.45),
            dec!(1.00),
            dec!(-62946.00),
        ),
        fx,
    );

    let days = engine
        .run_days(
            dec!(79754.81),
            CarryOverState::default(),
            vec![
                DayOfficials {
                    date: d(12),
                    official_open: Some(dec!(79754.81)),
                    official_close: dec!(79754.81),
                    events: vec![assignment],
                },
                DayOfficials {
                    date: d(13),
                    official_open: Some(dec!(79754.81)),
                    official_close: dec!(79700.00),
                    events: vec![cover],
                },
            ],
        )
        .unwrap();

    // (628.00 - 629.45) x 100 x 0.92 - 1.00 x 0.92
    let second = &days[1];
    assert_eq!(second.stats.overnight_pnl, dec!(-134.32));
    assert_eq!(second.blocks[0].kind, BlockKind::AssignmentCover);
    assert_eq!(second.blocks[0].pnl, dec!(-134.32));
    assert_eq!(second.record.calculated_opening_nav, dec!(79620.49));
    assert_eq!(second.record.opening_delta(), Some(dec!(134.32)));
    assert_eq!(second.record.reconciliation_delta, dec!(79.51));
}

#[test]
fn scenario_cover_without_carry_over_is_a_plain_trade() {
    let engine = NarrativeEngine::with_default_window(ExchangeCalendar::nyse());
    let cover = stock(
        "T-1",
        Utc.with_ymd_and_hms(2024, 6, 13, 12, 0, 0).unwrap(),
        EventKind::Trade,
        100,
        dec!(629.45),
        dec!(1.00),
        dec!(-62946.00),
    );

    let n = engine
        .run_days(
            dec!(79754.81),
            CarryOverState::default(),
            vec![DayOfficials {
                date: d(13),
                official_open: None,
                official_close: dec!(79754.81),
                events: vec![cover],
            }],
        )
        .unwrap();

    // Restart without the persisted assignment: no overnight P&L is derived.
    assert_eq!(n[0].stats.overnight_pnl, dec!(0));
    assert_eq!(n[0].record.calculated_opening_nav, dec!(79754.81));
    assert_eq!(n[0].stats.open_position_commissions, dec!(1.00));
    assert_eq!(n[0].blocks[0].kind, BlockKind::Trade);
}
