use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use nav_calendar::ExchangeCalendar;
use nav_schemas::{CarryOverState, DailyNAVRecord, EventKind, Instrument, LedgerEvent};

use crate::lots::LotBook;
use crate::phase::PhaseMachine;
use crate::tracker::AssignmentTracker;
use crate::{BlockKind, DayPhase, NarrativeBlock, NarrativeError};

/// Adjacent trades on one instrument whose first fill is at most this far
/// from the latest one are narrated as a single block.
pub const DEFAULT_GROUPING_WINDOW: std::time::Duration = std::time::Duration::from_secs(30 * 60);

/// Everything needed to narrate one trading day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayInput {
    pub date: NaiveDate,
    /// Official closing NAV of the previous trading day; the day starts here.
    pub previous_official_close: Decimal,
    pub official_open: Option<Decimal>,
    pub official_close: Decimal,
    /// Events in the day window, in `(timestamp, external_id)` order.
    pub events: Vec<LedgerEvent>,
    pub carry_over: CarryOverState,
}

/// Per-day officials and events for [`NarrativeEngine::run_days`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOfficials {
    pub date: NaiveDate,
    pub official_open: Option<Decimal>,
    pub official_close: Decimal,
    pub events: Vec<LedgerEvent>,
}

/// Figures the reconciliation reporter uses to explain drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeStats {
    pub event_count: usize,
    pub provisional_event_count: usize,
    pub premarket_event_count: usize,
    /// Net NAV impact of pre-market events (reporting currency).
    pub premarket_impact: Decimal,
    pub overnight_pnl: Decimal,
    /// Commissions paid today on trades that opened positions; not yet
    /// realized in the calculated NAV.
    pub open_position_commissions: Decimal,
    pub missing_amount_transfers: Vec<String>,
    pub unclassified_events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNarrative {
    pub date: NaiveDate,
    pub blocks: Vec<NarrativeBlock>,
    pub record: DailyNAVRecord,
    /// Working state at this day's close; feeds the next day.
    pub carry_over: CarryOverState,
    pub phase: DayPhase,
    pub stats: NarrativeStats,
}

#[derive(Debug, Clone)]
pub struct NarrativeEngine {
    calendar: ExchangeCalendar,
    grouping_window: Duration,
}

impl NarrativeEngine {
    pub fn new(calendar: ExchangeCalendar, grouping_window: Duration) -> Self {
        Self {
            calendar,
            grouping_window,
        }
    }

    pub fn with_default_window(calendar: ExchangeCalendar) -> Self {
        Self::new(
            calendar,
            Duration::seconds(DEFAULT_GROUPING_WINDOW.as_secs() as i64),
        )
    }

    pub fn calendar(&self) -> &ExchangeCalendar {
        &self.calendar
    }

    pub fn grouping_window(&self) -> Duration {
        self.grouping_window
    }

    pub fn narrate_day(&self, input: DayInput) -> Result<DailyNarrative, NarrativeError> {
        let date = input.date;
        if !self.calendar.is_trading_day(date) {
            return Err(NarrativeError::NotATradingDay { date });
        }
        if let Some(as_of) = input.carry_over.as_of {
            if as_of >= date {
                return Err(NarrativeError::StaleCarryOver { as_of, date });
            }
        }
        self.validate_events(date, &input.events)?;

        let open_ts = self.calendar.session_open(date);
        let close_ts = self.calendar.session_close(date);
        let mut run = DayRun::new(self.grouping_window, input.previous_official_close, input.carry_over);

        for ev in &input.events {
            let phase = if ev.timestamp < open_ts {
                DayPhase::PreMarket
            } else {
                DayPhase::Intraday
            };
            if phase == DayPhase::Intraday && run.machine.phase() == DayPhase::PreMarket {
                run.open_market(input.official_open, open_ts)?;
            }
            run.machine.require(phase, &ev.external_id)?;
            run.apply(ev, phase);
        }
        if run.machine.phase() == DayPhase::PreMarket {
            run.open_market(input.official_open, open_ts)?;
        }

        let calculated_close = run.close_market(input.official_close, close_ts)?;
        let calculated_open = run.calculated_open.unwrap_or(input.previous_official_close);
        let record = DailyNAVRecord::new(
            date,
            input.official_open,
            calculated_open,
            input.official_close,
            calculated_close,
        );
        run.machine.advance(DayPhase::Reconciled)?;

        info!(
            %date,
            events = run.stats.event_count,
            blocks = run.blocks.len(),
            calculated_open = %record.calculated_opening_nav,
            calculated_close = %record.calculated_closing_nav,
            delta = %record.reconciliation_delta,
            "day narrated"
        );

        let carry_over = CarryOverState {
            as_of: Some(date),
            assignments: run.tracker.into_positions(),
            option_lots: run.lots.into_lots(),
        };
        Ok(DailyNarrative {
            date,
            blocks: run.blocks,
            record,
            carry_over,
            phase: run.machine.phase(),
            stats: run.stats,
        })
    }

    /// Narrate consecutive trading days, threading each day's official close
    /// and carry-over state into the next.
    pub fn run_days(
        &self,
        previous_official_close: Decimal,
        carry_over: CarryOverState,
        days: Vec<DayOfficials>,
    ) -> Result<Vec<DailyNarrative>, NarrativeError> {
        let mut prev_close = previous_official_close;
        let mut carry = carry_over;
        let mut prev_date: Option<NaiveDate> = None;
        let mut out = Vec::with_capacity(days.len());

        for day in days {
            if let Some(previous) = prev_date {
                if self.calendar.next_trading_day(previous) != day.date {
                    return Err(NarrativeError::NonConsecutiveDays {
                        previous,
                        date: day.date,
                    });
                }
            }
            let narrative = self.narrate_day(DayInput {
                date: day.date,
                previous_official_close: prev_close,
                official_open: day.official_open,
                official_close: day.official_close,
                events: day.events,
                carry_over: carry,
            })?;
            prev_close = narrative.record.official_closing_nav;
            carry = narrative.carry_over.clone();
            prev_date = Some(day.date);
            out.push(narrative);
        }
        Ok(out)
    }

    fn validate_events(&self, date: NaiveDate, events: &[LedgerEvent]) -> Result<(), NarrativeError> {
        let (start, end) = self.calendar.day_window(date);
        let mut seen = HashSet::with_capacity(events.len());
        let mut prev: Option<&LedgerEvent> = None;

        for ev in events {
            if ev.timestamp <= start || ev.timestamp > end {
                return Err(NarrativeError::OutsideDayWindow {
                    external_id: ev.external_id.clone(),
                    timestamp: ev.timestamp,
                    date,
                    start,
                    end,
                });
            }
            if !seen.insert(ev.external_id.as_str()) {
                return Err(NarrativeError::DuplicateEvent {
                    external_id: ev.external_id.clone(),
                });
            }
            if let Some(p) = prev {
                if p.sort_key() > ev.sort_key() {
                    return Err(NarrativeError::OutOfOrder {
                        external_id: ev.external_id.clone(),
                        previous: p.external_id.clone(),
                    });
                }
            }
            prev = Some(ev);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// One day's sequential pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKey {
    Trade(Instrument),
    Premium {
        underlying: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
struct OpenGroup {
    key: GroupKey,
    count: usize,
    net_quantity: i64,
}

struct Applied {
    impact: Decimal,
    kind: BlockKind,
    description: String,
    group: Option<GroupKey>,
}

impl Applied {
    fn single(impact: Decimal, kind: BlockKind, description: String) -> Self {
        Self {
            impact,
            kind,
            description,
            group: None,
        }
    }
}

struct DayRun {
    window: Duration,
    machine: PhaseMachine,
    nav: Decimal,
    calculated_open: Option<Decimal>,
    tracker: AssignmentTracker,
    lots: LotBook,
    blocks: Vec<NarrativeBlock>,
    open_group: Option<OpenGroup>,
    stats: NarrativeStats,
}

fn money(d: Decimal) -> String {
    d.round_dp(2).to_string()
}

fn trade_line(ev: &LedgerEvent) -> String {
    let side = if ev.quantity >= 0 { "BUY" } else { "SELL" };
    format!("{side} {} {} @ {}", ev.quantity.abs(), ev.instrument, ev.price.normalize())
}

impl DayRun {
    fn new(window: Duration, opening_nav: Decimal, carry: CarryOverState) -> Self {
        Self {
            window,
            machine: PhaseMachine::new(),
            nav: opening_nav,
            calculated_open: None,
            tracker: AssignmentTracker::from_positions(carry.assignments),
            lots: LotBook::from_lots(carry.option_lots),
            blocks: Vec::new(),
            open_group: None,
            stats: NarrativeStats::default(),
        }
    }

    fn open_market(&mut self, official_open: Option<Decimal>, at: DateTime<Utc>) -> Result<(), NarrativeError> {
        self.machine.advance(DayPhase::MarketOpen)?;
        let calculated = self.nav;
        self.calculated_open = Some(calculated);

        let official = official_open.map(money).unwrap_or_else(|| "not published".to_string());
        self.push(NarrativeBlock {
            phase: DayPhase::MarketOpen,
            kind: BlockKind::Opening,
            started_at: at,
            ended_at: at,
            description: format!("opening NAV {} (official {official})", money(calculated)),
            event_ids: Vec::new(),
            pnl: Decimal::ZERO,
            nav_after: calculated,
        });

        if let Some(official) = official_open.filter(|o| *o != calculated) {
            let gap = calculated - official;
            warn!(%calculated, %official, %gap, "opening NAV diverges from official");
            self.push(NarrativeBlock {
                phase: DayPhase::MarketOpen,
                kind: BlockKind::OpeningDivergence,
                started_at: at,
                ended_at: at,
                description: format!(
                    "calculated opening NAV {} differs from official {} by {}; the official figure excludes {} pre-market event(s)",
                    money(calculated),
                    money(official),
                    money(gap),
                    self.stats.premarket_event_count
                ),
                event_ids: Vec::new(),
                pnl: Decimal::ZERO,
                nav_after: calculated,
            });
        }

        self.machine.advance(DayPhase::Intraday)
    }

    fn close_market(&mut self, official_close: Decimal, at: DateTime<Utc>) -> Result<Decimal, NarrativeError> {
        self.machine.advance(DayPhase::MarketClose)?;
        let calculated = self.nav;
        let residual = official_close - calculated;
        if !residual.is_zero() {
            self.nav = official_close;
            self.push(NarrativeBlock {
                phase: DayPhase::MarketClose,
                kind: BlockKind::MarkToMarket,
                started_at: at,
                ended_at: at,
                description: format!(
                    "mark-to-market {} accepted at close (official {}, calculated {})",
                    money(residual),
                    money(official_close),
                    money(calculated)
                ),
                event_ids: Vec::new(),
                pnl: residual,
                nav_after: official_close,
            });
        }
        Ok(calculated)
    }

    fn push(&mut self, block: NarrativeBlock) {
        self.open_group = None;
        self.blocks.push(block);
    }

    fn apply(&mut self, ev: &LedgerEvent, phase: DayPhase) {
        let applied = match ev.kind {
            EventKind::Assignment => {
                self.tracker.open(ev);
                Applied::single(
                    Decimal::ZERO,
                    BlockKind::Assignment,
                    format!(
                        "assigned {} {} at strike {} (NAV-neutral)",
                        ev.quantity,
                        ev.instrument,
                        ev.price.normalize()
                    ),
                )
            }
            EventKind::CashTransaction => self.apply_cash(ev),
            EventKind::Unclassified => {
                self.stats.unclassified_events.push(ev.external_id.clone());
                Applied::single(
                    Decimal::ZERO,
                    BlockKind::Unclassified,
                    format!("unclassified entry on {} (flagged, not applied)", ev.instrument),
                )
            }
            EventKind::Trade => self.apply_trade(ev),
            EventKind::Expiration => self.apply_expiration(ev),
        };

        self.nav += applied.impact;
        self.stats.event_count += 1;
        if ev.is_provisional() {
            self.stats.provisional_event_count += 1;
        }
        if phase == DayPhase::PreMarket {
            self.stats.premarket_event_count += 1;
            self.stats.premarket_impact += applied.impact;
        }
        debug!(external_id = %ev.external_id, kind = ev.kind.as_str(), impact = %applied.impact, nav = %self.nav, "event applied");
        self.narrate(ev, phase, applied);
    }

    fn apply_cash(&mut self, ev: &LedgerEvent) -> Applied {
        let label = if ev.description.is_empty() {
            "cash transfer"
        } else {
            ev.description.as_str()
        };
        match ev.cash_impact_reporting_ccy {
            Some(amount) => Applied::single(amount, BlockKind::CashTransfer, format!("{label}: {}", money(amount))),
            None => {
                warn!(external_id = %ev.external_id, "cash transfer without amount contributes 0");
                self.stats.missing_amount_transfers.push(ev.external_id.clone());
                Applied::single(
                    Decimal::ZERO,
                    BlockKind::CashTransfer,
                    format!("{label}: amount missing upstream (flagged, not applied)"),
                )
            }
        }
    }

    fn apply_trade(&mut self, ev: &LedgerEvent) -> Applied {
        let grouped = |impact: Decimal| Applied {
            impact,
            kind: BlockKind::Trade,
            description: trade_line(ev),
            group: Some(GroupKey::Trade(ev.instrument.clone())),
        };

        match &ev.instrument {
            Instrument::Equity { .. } => {
                if let Some(cover) = self.tracker.cover(ev) {
                    self.stats.overnight_pnl += cover.overnight_pnl;
                    return Applied::single(
                        cover.overnight_pnl,
                        BlockKind::AssignmentCover,
                        format!(
                            "{} covers assignment at strike {}: overnight P&L {}",
                            trade_line(ev),
                            cover.strike.normalize(),
                            money(cover.overnight_pnl)
                        ),
                    );
                }
                match ev.realized_pnl_reporting() {
                    Some(realized) => grouped(realized),
                    None => {
                        self.stats.open_position_commissions += ev.commission_reporting();
                        grouped(Decimal::ZERO)
                    }
                }
            }
            Instrument::Option(contract) => {
                let effect = self.lots.apply_trade(ev, contract);
                if effect.close.closed_quantity == 0 {
                    self.stats.open_position_commissions += ev.commission_reporting();
                }
                grouped(
                    ev.realized_pnl_reporting()
                        .unwrap_or(effect.close.realized_reporting),
                )
            }
            Instrument::Cash { .. } => grouped(ev.cash_impact_reporting_ccy.unwrap_or(Decimal::ZERO)),
        }
    }

    fn apply_expiration(&mut self, ev: &LedgerEvent) -> Applied {
        let realized = match ev.instrument.option() {
            Some(contract) => {
                let close = self.lots.expire(ev, contract);
                ev.realized_pnl_reporting().unwrap_or(close.realized_reporting)
            }
            None => ev.realized_pnl_reporting().unwrap_or(Decimal::ZERO),
        };
        let zero_cash = ev.cash_impact_local.map_or(true, |c| c.is_zero());

        if zero_cash && realized > Decimal::ZERO {
            Applied {
                impact: realized,
                kind: BlockKind::PremiumRetained,
                description: premium_line(1, ev.instrument.underlying(), realized),
                group: Some(GroupKey::Premium {
                    underlying: ev.instrument.underlying().to_string(),
                    at: ev.timestamp,
                }),
            }
        } else {
            Applied::single(
                realized,
                BlockKind::OptionExpired,
                format!("{} expired: realized {}", ev.instrument, money(realized)),
            )
        }
    }

    fn narrate(&mut self, ev: &LedgerEvent, phase: DayPhase, applied: Applied) {
        let merge = match (&applied.group, &self.open_group, self.blocks.last()) {
            (Some(key), Some(open), Some(last)) if *key == open.key && last.kind == applied.kind => match key {
                GroupKey::Trade(_) => {
                    phase == DayPhase::Intraday && ev.timestamp - last.started_at <= self.window
                }
                GroupKey::Premium { .. } => true,
            },
            _ => false,
        };

        let nav = self.nav;
        if merge {
            if let (Some(open), Some(last)) = (self.open_group.as_mut(), self.blocks.last_mut()) {
                open.count += 1;
                open.net_quantity += ev.quantity;
                last.event_ids.push(ev.external_id.clone());
                last.pnl += applied.impact;
                last.ended_at = ev.timestamp;
                last.nav_after = nav;
                last.description = match &open.key {
                    GroupKey::Trade(instrument) => format!(
                        "{} trades on {} over {} min: net {:+}, P&L {}",
                        open.count,
                        instrument,
                        (last.ended_at - last.started_at).num_minutes(),
                        open.net_quantity,
                        money(last.pnl)
                    ),
                    GroupKey::Premium { underlying, .. } => premium_line(open.count, underlying, last.pnl),
                };
            }
            return;
        }

        self.push(NarrativeBlock {
            phase,
            kind: applied.kind,
            started_at: ev.timestamp,
            ended_at: ev.timestamp,
            description: applied.description,
            event_ids: vec![ev.external_id.clone()],
            pnl: applied.impact,
            nav_after: nav,
        });
        self.open_group = applied.group.map(|key| OpenGroup {
            key,
            count: 1,
            net_quantity: ev.quantity,
        });
    }
}

fn premium_line(count: usize, underlying: &str, realized: Decimal) -> String {
    let noun = if count == 1 { "option" } else { "options" };
    format!(
        "premium retained on {count} expired {underlying} {noun}: realized {}",
        money(realized)
    )
}
