//! Scenario: two short calls sold and left to expire worthless.
//!
//! Expirations carry zero cash and no realized figure; the premium parked in
//! the option lots is realized at expiry. Simultaneous expirations on one
//! underlying narrate as a single "premium retained" block.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use nav_calendar::ExchangeCalendar;
use nav_narrative::{BlockKind, DayInput, NarrativeEngine};
use nav_schemas::{
    CarryOverState, EventKind, EventSource, Instrument, LedgerEvent, OptionContract, OptionRight,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn contract(strike: Decimal) -> OptionContract {
    OptionContract {
        underlying: "SPY".to_string(),
        strike,
        right: OptionRight::Call,
        expiry: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
        multiplier: 100,
    }
}

fn option_event(id: &str, ts: DateTime<Utc>, kind: EventKind, strike: Decimal, qty: i64, cash: Decimal) -> LedgerEvent {
    LedgerEvent {
        external_id: id.to_string(),
        timestamp: ts,
        source_tz: chrono_tz::America::New_York,
        kind,
        instrument: Instrument::Option(contract(strike)),
        quantity: qty,
        price: dec!(0),
        commission: dec!(0),
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

#[test]
fn scenario_simultaneous_expirations_group_into_one_premium_block() {
    let engine = NarrativeEngine::with_default_window(ExchangeCalendar::nyse());
    let at = |h, m| Utc.with_ymd_and_hms(2024, 6, 12, h, m, 0).unwrap();

    // Net premium after commissions: 39.14 + 36.13 = 75.27.
    let events = vec![
        option_event("S-1", at(14, 0), EventKind::Trade, dec!(640), -1, dec!(39.14)),
        option_event("S-2", at(15, 10), EventKind::Trade, dec!(645), -1, dec!(36.13)),
        option_event("X-1", at(20, 0), EventKind::Expiration, dec!(640), 1, dec!(0)),
        option_event("X-2", at(20, 0), EventKind::Expiration, dec!(645), 1, dec!(0)),
    ];

    let n = engine
        .narrate_day(DayInput {
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            previous_official_close: dec!(100000.00),
            official_open: None,
            official_close: dec!(100075.27),
            events,
            carry_over: CarryOverState::default(),
        })
        .unwrap();

    let premium: Vec<_> = n
        .blocks
        .iter()
        .filter(|b| b.kind == BlockKind::PremiumRetained)
        .collect();
    assert_eq!(premium.len(), 1);
    assert!(premium[0].is_grouped());
    assert_eq!(premium[0].pnl, dec!(75.27));
    assert_eq!(premium[0].event_ids, vec!["X-1".to_string(), "X-2".to_string()]);
    assert!(premium[0].description.contains("2 expired SPY options"));

    // Opening sells are NAV-neutral; the premium lands at expiry.
    assert_eq!(n.record.calculated_closing_nav, dec!(100075.27));
    assert_eq!(n.record.reconciliation_delta, dec!(0));
    assert!(n.carry_over.option_lots.is_empty());
    assert!(!n.blocks.iter().any(|b| b.kind == BlockKind::MarkToMarket));
}

fn in_fx(mut ev: LedgerEvent, fx: Decimal) -> LedgerEvent {
    ev.fx_rate = fx;
    ev.cash_impact_reporting_ccy = ev.cash_impact_local.map(|c| c * fx);
    ev
}

#[test]
fn scenario_premium_is_realized_at_the_opening_rate() {
    let engine = NarrativeEngine::with_default_window(ExchangeCalendar::nyse());
    let at = |h, m| Utc.with_ymd_and_hms(2024, 6, 12, h, m, 0).unwrap();

    // 39.14 x 0.92 + 36.13 x 0.95 = 36.0088 + 34.3235; the expiry rate plays no part.
    let events = vec![
        in_fx(option_event("S-1", at(14, 0), EventKind::Trade, dec!(640), -1, dec!(39.14)), dec!(0.92)),
        in_fx(option_event("S-2", at(15, 10), EventKind::Trade, dec!(645), -1, dec!(36.13)), dec!(0.95)),
        in_fx(option_event("X-1", at(20, 0), EventKind::Expiration, dec!(640), 1, dec!(0)), dec!(1.10)),
        in_fx(option_event("X-2", at(20, 0), EventKind::Expiration, dec!(645), 1, dec!(0)), dec!(1.10)),
    ];

    let n = engine
        .narrate_day(DayInput {
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            previous_official_close: dec!(100000.00),
            official_open: None,
            official_close: dec!(100070.3323),
            events,
            carry_over: CarryOverState::default(),
        })
        .unwrap();

    let premium = n
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::PremiumRetained)
        .unwrap();
    assert_eq!(premium.pnl, dec!(70.3323));
    assert_eq!(premium.event_ids.len(), 2);
    assert_eq!(n.record.calculated_closing_nav, dec!(100070.3323));
    assert_eq!(n.record.reconciliation_delta, dec!(0));
}

#[test]
fn scenario_open_lots_carry_to_the_next_day() {
    let engine = NarrativeEngine::with_default_window(ExchangeCalendar::nyse());
    let sell = option_event(
        "S-1",
        Utc.with_ymd_and_hms(2024, 6, 11, 14, 0, 0).unwrap(),
        EventKind::Trade,
        dec!(640),
        -1,
        dec!(39.14),
    );
    let day1 = engine
        .narrate_day(DayInput {
            date: NaiveDate::from_ymd_opt(2024, 6, 11).unwrap(),
            previous_official_close: dec!(100000.00),
            official_open: None,
            official_close: dec!(100000.00),
            events: vec![sell],
            carry_over: CarryOverState::default(),
        })
        .unwrap();
    assert_eq!(day1.carry_over.option_lots.len(), 1);

    let expiry = option_event(
        "X-1",
        Utc.with_ymd_and_hms(2024, 6, 12, 20, 0, 0).unwrap(),
        EventKind::Expiration,
        dec!(640),
        1,
        dec!(0),
    );
    let day2 = engine
        .narrate_day(DayInput {
            date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            previous_official_close: day1.record.official_closing_nav,
            official_open: None,
            official_close: dec!(100039.14),
            events: vec![expiry],
            carry_over: day1.carry_over,
        })
        .unwrap();

    assert_eq!(day2.record.reconciliation_delta, dec!(0));
    let block = day2
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::PremiumRetained)
        .unwrap();
    assert_eq!(block.pnl, dec!(39.14));
    assert!(!block.is_grouped());
}
