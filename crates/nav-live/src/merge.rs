use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use nav_calendar::ExchangeCalendar;
use nav_schemas::{sort_events, LedgerEvent};

/// One ordered timeline from settled and provisional events.
///
/// Live events whose trading day is on or before `covered_through` (the
/// last day a historical report covers) are dropped. A live event sharing an
/// `external_id` with a historical one is dropped as well.
pub fn merge_timeline(
    calendar: &ExchangeCalendar,
    historical: Vec<LedgerEvent>,
    live: Vec<LedgerEvent>,
    covered_through: Option<NaiveDate>,
) -> Vec<LedgerEvent> {
    let known: HashSet<String> = historical.iter().map(|e| e.external_id.clone()).collect();
    let historical_total = historical.len();
    let live_total = live.len();

    let mut out = historical;
    out.extend(live.into_iter().filter(|e| {
        let covered = covered_through.is_some_and(|c| calendar.trading_day_for(e.timestamp) <= c);
        !covered && !known.contains(&e.external_id)
    }));
    let kept_live = out.len() - historical_total;
    debug!(live = live_total, kept_live, dropped = live_total - kept_live, "timeline merged");

    sort_events(&mut out);
    out
}
