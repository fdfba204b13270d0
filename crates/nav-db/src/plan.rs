//! Idempotent upsert planning.
//!
//! Both store implementations run every incoming event through
//! [`plan_upsert`] and then execute the returned plan. Keeping the decision
//! pure means the Postgres and in-memory stores cannot disagree about what a
//! re-ingest does.
//!
//! | existing         | incoming         | outcome                                   |
//! |------------------|------------------|-------------------------------------------|
//! | none             | any              | insert                                    |
//! | identical        | identical        | unchanged                                 |
//! | historical       | live             | ignored (historical wins)                 |
//! | live             | historical       | superseded, every change audited          |
//! | same source      | null amount set  | applied, `LATE_AMOUNT` correction         |
//! | same source      | value changed    | applied within grace (`RESTATEMENT`)      |
//! | historical       | value changed    | rejected once frozen (outside grace)      |
//!
//! Stores pass the incoming event through [`retain_known_amounts`] first, so
//! a report path that omits amounts never nulls one already on file.

use std::borrow::Cow;

use chrono::{DateTime, Duration, Utc};

use nav_schemas::{CorrectionReason, EventCorrection, EventFlag, EventSource, LedgerEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertPlan {
    Insert,
    Unchanged,
    /// Live data never overwrites a settled historical row.
    HistoricalWins,
    /// Write the incoming event over the stored one and append `corrections`.
    /// An empty list means only non-audited fields (description, flags)
    /// changed.
    Apply {
        corrections: Vec<EventCorrection>,
        superseded: bool,
    },
    /// The stored row is frozen; nothing is written.
    RejectFrozen { fields: Vec<String> },
}

/// Tracked fields, rendered for the correction trail.
fn tracked(ev: &LedgerEvent) -> [(&'static str, Option<String>, bool); 11] {
    let d = |v: Option<rust_decimal::Decimal>| v.map(|x| x.normalize().to_string());
    [
        ("timestamp", Some(ev.timestamp.to_rfc3339()), false),
        ("kind", Some(ev.kind.as_str().to_string()), false),
        ("instrument", Some(ev.instrument.to_string()), false),
        ("currency", Some(ev.currency.clone()), false),
        ("quantity", Some(ev.quantity.to_string()), true),
        ("price", d(Some(ev.price)), true),
        ("commission", d(Some(ev.commission)), true),
        ("fx_rate", d(Some(ev.fx_rate)), true),
        ("cash_impact_local", d(ev.cash_impact_local), true),
        ("cash_impact_reporting_ccy", d(ev.cash_impact_reporting_ccy), true),
        ("realized_pnl", d(ev.realized_pnl), true),
    ]
}

/// A historical row stops accepting restatements once `grace` has passed
/// since the activity it records. Live rows are provisional and never freeze.
pub fn is_frozen(existing: &LedgerEvent, now: DateTime<Utc>, grace: Duration) -> bool {
    existing.source == EventSource::HistoricalReport && now - existing.timestamp > grace
}

/// Carries stored amounts into an incoming event that lacks them.
///
/// Amounts only move from unknown to known: `Some(x)` on file stays `Some(x)`
/// when the incoming record has `None`. Returns the incoming event untouched
/// when there is nothing to fill.
pub fn retain_known_amounts<'a>(
    existing: Option<&LedgerEvent>,
    incoming: &'a LedgerEvent,
) -> Cow<'a, LedgerEvent> {
    let Some(existing) = existing else {
        return Cow::Borrowed(incoming);
    };
    let fills = |stored: Option<rust_decimal::Decimal>, new: Option<rust_decimal::Decimal>| {
        stored.is_some() && new.is_none()
    };
    if !fills(existing.cash_impact_local, incoming.cash_impact_local)
        && !fills(existing.cash_impact_reporting_ccy, incoming.cash_impact_reporting_ccy)
        && !fills(existing.realized_pnl, incoming.realized_pnl)
    {
        return Cow::Borrowed(incoming);
    }

    let mut merged = incoming.clone();
    merged.cash_impact_local = merged.cash_impact_local.or(existing.cash_impact_local);
    merged.cash_impact_reporting_ccy = merged
        .cash_impact_reporting_ccy
        .or(existing.cash_impact_reporting_ccy);
    merged.realized_pnl = merged.realized_pnl.or(existing.realized_pnl);
    if merged.cash_impact_local.is_some() && merged.cash_impact_reporting_ccy.is_some() {
        merged.flags.remove(&EventFlag::MissingAmount);
    }
    Cow::Owned(merged)
}

pub fn plan_upsert(
    existing: Option<&LedgerEvent>,
    incoming: &LedgerEvent,
    now: DateTime<Utc>,
    grace: Duration,
) -> UpsertPlan {
    let Some(existing) = existing else {
        return UpsertPlan::Insert;
    };
    if existing == incoming {
        return UpsertPlan::Unchanged;
    }

    match (existing.source, incoming.source) {
        (EventSource::HistoricalReport, EventSource::LiveSession) => UpsertPlan::HistoricalWins,
        (EventSource::LiveSession, EventSource::HistoricalReport) => {
            let mut corrections =
                diff(existing, incoming, now, |_, _, _| CorrectionReason::SupersededByHistorical);
            corrections.push(correction(
                &incoming.external_id,
                "source",
                Some(existing.source.as_str().to_string()),
                Some(incoming.source.as_str().to_string()),
                CorrectionReason::SupersededByHistorical,
                now,
            ));
            UpsertPlan::Apply {
                corrections,
                superseded: true,
            }
        }
        _ => {
            let corrections = diff(existing, incoming, now, |old, _, is_amount| {
                if is_amount && old.is_none() {
                    CorrectionReason::LateAmount
                } else {
                    CorrectionReason::Restatement
                }
            });
            let restated: Vec<String> = corrections
                .iter()
                .filter(|c| c.reason == CorrectionReason::Restatement)
                .map(|c| c.field.clone())
                .collect();
            if !restated.is_empty() && is_frozen(existing, now, grace) {
                return UpsertPlan::RejectFrozen { fields: restated };
            }
            UpsertPlan::Apply {
                corrections,
                superseded: false,
            }
        }
    }
}

fn diff(
    existing: &LedgerEvent,
    incoming: &LedgerEvent,
    now: DateTime<Utc>,
    reason: impl Fn(&Option<String>, &Option<String>, bool) -> CorrectionReason,
) -> Vec<EventCorrection> {
    tracked(existing)
        .into_iter()
        .zip(tracked(incoming))
        .filter(|((_, old, _), (_, new, _))| old != new)
        .map(|((field, old, is_amount), (_, new, _))| {
            let r = reason(&old, &new, is_amount);
            correction(&incoming.external_id, field, old, new, r, now)
        })
        .collect()
}

fn correction(
    external_id: &str,
    field: &str,
    old_value: Option<String>,
    new_value: Option<String>,
    reason: CorrectionReason,
    now: DateTime<Utc>,
) -> EventCorrection {
    EventCorrection {
        external_id: external_id.to_string(),
        field: field.to_string(),
        old_value,
        new_value,
        reason,
        recorded_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nav_schemas::{EventFlag, EventKind, Instrument};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn deposit(source: EventSource) -> LedgerEvent {
        LedgerEvent {
            external_id: "C-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap(),
            source_tz: chrono_tz::America::New_York,
            kind: EventKind::CashTransaction,
            instrument: Instrument::Cash {
                currency: "USD".to_string(),
            },
            quantity: 0,
            price: dec!(0),
            commission: dec!(0),
            currency: "USD".to_string(),
            fx_rate: dec!(1),
            cash_impact_local: Some(dec!(1000)),
            cash_impact_reporting_ccy: Some(dec!(1000)),
            realized_pnl: None,
            source,
            flags: BTreeSet::new(),
            description: "Deposit".to_string(),
        }
    }

    fn at(days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap() + Duration::days(days)
    }

    const GRACE: i64 = 5;

    #[test]
    fn first_sight_inserts_and_replay_is_unchanged() {
        let ev = deposit(EventSource::HistoricalReport);
        assert_eq!(plan_upsert(None, &ev, at(1), Duration::days(GRACE)), UpsertPlan::Insert);
        assert_eq!(
            plan_upsert(Some(&ev), &ev.clone(), at(30), Duration::days(GRACE)),
            UpsertPlan::Unchanged
        );
    }

    #[test]
    fn live_never_overwrites_historical() {
        let hist = deposit(EventSource::HistoricalReport);
        let mut live = deposit(EventSource::LiveSession);
        live.cash_impact_local = Some(dec!(999));
        assert_eq!(
            plan_upsert(Some(&hist), &live, at(0), Duration::days(GRACE)),
            UpsertPlan::HistoricalWins
        );
    }

    #[test]
    fn historical_supersedes_live_with_audited_fields() {
        let mut live = deposit(EventSource::LiveSession);
        live.cash_impact_local = Some(dec!(990));
        live.cash_impact_reporting_ccy = Some(dec!(990));
        let hist = deposit(EventSource::HistoricalReport);

        match plan_upsert(Some(&live), &hist, at(1), Duration::days(GRACE)) {
            UpsertPlan::Apply {
                corrections,
                superseded,
            } => {
                assert!(superseded);
                let fields: Vec<&str> = corrections.iter().map(|c| c.field.as_str()).collect();
                assert_eq!(fields, vec!["cash_impact_local", "cash_impact_reporting_ccy", "source"]);
                assert!(corrections
                    .iter()
                    .all(|c| c.reason == CorrectionReason::SupersededByHistorical));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn late_amount_applies_even_when_frozen() {
        let mut old = deposit(EventSource::HistoricalReport);
        old.cash_impact_local = None;
        old.cash_impact_reporting_ccy = None;
        old.flags.insert(EventFlag::MissingAmount);
        let new = deposit(EventSource::HistoricalReport);

        match plan_upsert(Some(&old), &new, at(40), Duration::days(GRACE)) {
            UpsertPlan::Apply { corrections, .. } => {
                assert_eq!(corrections.len(), 2);
                assert!(corrections.iter().all(|c| c.reason == CorrectionReason::LateAmount));
                assert_eq!(corrections[0].old_value, None);
                assert_eq!(corrections[0].new_value.as_deref(), Some("1000"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn restatement_inside_grace_applies_outside_is_rejected() {
        let old = deposit(EventSource::HistoricalReport);
        let mut new = deposit(EventSource::HistoricalReport);
        new.cash_impact_local = Some(dec!(1100));
        new.cash_impact_reporting_ccy = Some(dec!(1100));

        match plan_upsert(Some(&old), &new, at(2), Duration::days(GRACE)) {
            UpsertPlan::Apply { corrections, .. } => {
                assert!(corrections.iter().all(|c| c.reason == CorrectionReason::Restatement));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            plan_upsert(Some(&old), &new, at(6), Duration::days(GRACE)),
            UpsertPlan::RejectFrozen {
                fields: vec![
                    "cash_impact_local".to_string(),
                    "cash_impact_reporting_ccy".to_string()
                ]
            }
        );
    }

    #[test]
    fn amountless_refetch_keeps_known_amount() {
        let mut blank = deposit(EventSource::HistoricalReport);
        blank.cash_impact_local = None;
        blank.cash_impact_reporting_ccy = None;
        blank.flags.insert(EventFlag::MissingAmount);
        let known = deposit(EventSource::HistoricalReport);

        let merged = retain_known_amounts(Some(&known), &blank);
        assert_eq!(merged.cash_impact_local, Some(dec!(1000)));
        assert!(!merged.has_flag(EventFlag::MissingAmount));
        assert_eq!(
            plan_upsert(Some(&known), &merged, at(1), Duration::days(GRACE)),
            UpsertPlan::Unchanged
        );
    }

    #[test]
    fn retain_known_amounts_borrows_when_nothing_to_fill() {
        let known = deposit(EventSource::HistoricalReport);
        let mut restated = known.clone();
        restated.cash_impact_local = Some(dec!(1100));
        assert!(matches!(retain_known_amounts(Some(&known), &restated), Cow::Borrowed(_)));
        assert!(matches!(retain_known_amounts(None, &known), Cow::Borrowed(_)));
    }

    #[test]
    fn description_refresh_needs_no_correction() {
        let old = deposit(EventSource::HistoricalReport);
        let mut new = old.clone();
        new.description = "Deposit (wire)".to_string();
        assert_eq!(
            plan_upsert(Some(&old), &new, at(90), Duration::days(GRACE)),
            UpsertPlan::Apply {
                corrections: vec![],
                superseded: false
            }
        );
    }
}
