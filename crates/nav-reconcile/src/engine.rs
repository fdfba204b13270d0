use rust_decimal::Decimal;
use tracing::{info, warn};

use nav_schemas::DailyNAVRecord;

use crate::{DriftAction, DriftContext, DriftExplanation, DriftPolicy, DriftReport, OpeningReport};

fn classify_action(drift: Decimal, policy: &DriftPolicy) -> DriftAction {
    if drift.is_zero() {
        DriftAction::Clean
    } else if drift.abs() > policy.materiality_threshold {
        DriftAction::Escalate
    } else {
        DriftAction::Report
    }
}

/// Explanations that carry no amount. They point at ledger gaps; the
/// remainder stays unexplained.
fn push_gaps(context: &DriftContext, out: &mut Vec<DriftExplanation>) {
    if !context.missing_amount_transfers.is_empty() {
        out.push(DriftExplanation::UnclassifiedCashTransfers {
            count: context.missing_amount_transfers.len(),
            external_ids: context.missing_amount_transfers.clone(),
        });
    }
    if !context.unclassified_events.is_empty() {
        out.push(DriftExplanation::UnclassifiedEvents {
            count: context.unclassified_events.len(),
            external_ids: context.unclassified_events.clone(),
        });
    }
}

/// Closing drift report. `drift` is `record.reconciliation_delta` exactly.
pub fn report(record: &DailyNAVRecord, context: &DriftContext, policy: &DriftPolicy) -> DriftReport {
    let drift = record.reconciliation_delta;
    let action = classify_action(drift, policy);
    if action == DriftAction::Clean {
        return DriftReport {
            date: record.date,
            drift,
            action,
            explanations: Vec::new(),
            unexplained: Decimal::ZERO,
        };
    }

    let mut explanations = Vec::new();
    let mut explained = Decimal::ZERO;

    if !context.open_position_commissions.is_zero() {
        let amount = -context.open_position_commissions;
        explained += amount;
        explanations.push(DriftExplanation::Fees { amount });
    }
    push_gaps(context, &mut explanations);
    if context.provisional_event_count > 0 {
        explanations.push(DriftExplanation::Timing {
            amount: None,
            event_count: context.provisional_event_count,
        });
    }

    let unexplained = drift - explained;
    if !unexplained.is_zero() {
        explanations.push(DriftExplanation::Unexplained {
            amount: unexplained,
        });
    }

    match action {
        DriftAction::Escalate => warn!(
            date = %record.date,
            %drift,
            threshold = %policy.materiality_threshold,
            %unexplained,
            "material drift detected"
        ),
        _ => info!(date = %record.date, %drift, %unexplained, "drift within threshold"),
    }

    DriftReport {
        date: record.date,
        drift,
        action,
        explanations,
        unexplained,
    }
}

/// Opening checkpoint: official vs calculated opening NAV. Pre-market
/// activity the official figure has not absorbed is the timing
/// explanation.
pub fn report_opening(record: &DailyNAVRecord, context: &DriftContext) -> OpeningReport {
    let divergence = record.opening_delta();
    let mut explanations = Vec::new();

    if let Some(divergence) = divergence.filter(|d| !d.is_zero()) {
        let mut explained = Decimal::ZERO;
        if context.premarket_event_count > 0 {
            let amount = -context.premarket_impact;
            explained += amount;
            explanations.push(DriftExplanation::Timing {
                amount: Some(amount),
                event_count: context.premarket_event_count,
            });
        }
        push_gaps(context, &mut explanations);
        let rest = divergence - explained;
        if !rest.is_zero() {
            explanations.push(DriftExplanation::Unexplained { amount: rest });
        }
    }

    OpeningReport {
        date: record.date,
        official: record.official_opening_nav,
        calculated: record.calculated_opening_nav,
        divergence,
        explanations,
    }
}
