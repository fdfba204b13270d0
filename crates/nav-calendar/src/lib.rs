//! nav-calendar
//!
//! Exchange session calendar. Deterministic, pure logic: no IO, no
//! wall-clock. Every trading day `D` owns the event window
//! `(close(D-1), close(D)]`; anything in that window before `open(D)` is
//! pre-market activity for `D`.
//!
//! # Variants
//!
//! - [`CalendarSpec::NyseWeekdays`]: weekdays 09:30–16:00 America/New_York
//!   (DST-aware through `chrono-tz`), excluding the US market holiday table
//!   and closing at 13:00 on the published early-close days.
//! - [`CalendarSpec::AlwaysOn`]: every calendar day trades, 00:00–23:59:59
//!   in the configured timezone. Used for tests and non-equity sources.

mod holidays;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub use holidays::{is_early_close, is_nyse_holiday};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarSpec {
    AlwaysOn,
    NyseWeekdays,
}

/// Where an instant sits relative to its trading day's regular session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionPhase {
    /// After the previous close and before this day's open.
    PreMarket,
    /// Inside `[open, close)`.
    Regular,
    /// Exactly at the close instant (still belongs to this day).
    AtClose,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeCalendar {
    spec: CalendarSpec,
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    early_close: NaiveTime,
}

impl ExchangeCalendar {
    pub fn nyse() -> Self {
        Self {
            spec: CalendarSpec::NyseWeekdays,
            tz: chrono_tz::America::New_York,
            open: hms(9, 30, 0),
            close: hms(16, 0, 0),
            early_close: hms(13, 0, 0),
        }
    }

    pub fn always_on(tz: Tz) -> Self {
        Self {
            spec: CalendarSpec::AlwaysOn,
            tz,
            open: hms(0, 0, 0),
            close: hms(23, 59, 59),
            early_close: hms(23, 59, 59),
        }
    }

    /// Custom session hours on the given spec. Early closes only apply to
    /// the NYSE table.
    pub fn with_session(spec: CalendarSpec, tz: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            spec,
            tz,
            open,
            close,
            early_close: hms(13, 0, 0).min(close),
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn spec(&self) -> CalendarSpec {
        self.spec
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        match self.spec {
            CalendarSpec::AlwaysOn => true,
            CalendarSpec::NyseWeekdays => {
                !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
                    && !is_nyse_holiday(date.year() as i64, date.month() as i64, date.day() as i64)
            }
        }
    }

    pub fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date + Duration::days(1);
        while !self.is_trading_day(d) {
            d += Duration::days(1);
        }
        d
    }

    pub fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date - Duration::days(1);
        while !self.is_trading_day(d) {
            d -= Duration::days(1);
        }
        d
    }

    /// Trading days in `[start, end]`, ascending.
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut d = start;
        while d <= end {
            if self.is_trading_day(d) {
                out.push(d);
            }
            d += Duration::days(1);
        }
        out
    }

    pub fn session_open(&self, date: NaiveDate) -> DateTime<Utc> {
        local_to_utc(self.tz, date, self.open)
    }

    pub fn session_close(&self, date: NaiveDate) -> DateTime<Utc> {
        let close = match self.spec {
            CalendarSpec::NyseWeekdays
                if is_early_close(date.year() as i64, date.month() as i64, date.day() as i64) =>
            {
                self.early_close
            }
            _ => self.close,
        };
        local_to_utc(self.tz, date, close)
    }

    /// Event window `(close(prev trading day), close(date)]` owned by `date`.
    pub fn day_window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let prev = self.previous_trading_day(date);
        (self.session_close(prev), self.session_close(date))
    }

    /// The trading day whose window contains `ts`.
    pub fn trading_day_for(&self, ts: DateTime<Utc>) -> NaiveDate {
        let local_date = ts.with_timezone(&self.tz).date_naive();
        if self.is_trading_day(local_date) && ts <= self.session_close(local_date) {
            local_date
        } else {
            self.next_trading_day(local_date)
        }
    }

    /// Phase of `ts` within trading day `date`. Callers must only pass
    /// instants inside `day_window(date)`.
    pub fn phase_of(&self, date: NaiveDate, ts: DateTime<Utc>) -> SessionPhase {
        if ts < self.session_open(date) {
            SessionPhase::PreMarket
        } else if ts < self.session_close(date) {
            SessionPhase::Regular
        } else {
            SessionPhase::AtClose
        }
    }
}

impl Default for ExchangeCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    // Constant inputs; the fallback is unreachable for valid literals.
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

/// Resolve a local wall-clock time to UTC. Ambiguous times (DST fall-back)
/// take the earlier instant; nonexistent times (spring-forward gap) shift
/// one hour later.
fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(a, _) => a.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekend_and_holiday_are_not_trading_days() {
        let cal = ExchangeCalendar::nyse();
        assert!(cal.is_trading_day(d(2024, 1, 8)));
        assert!(!cal.is_trading_day(d(2024, 1, 6)));
        assert!(!cal.is_trading_day(d(2024, 1, 7)));
        assert!(!cal.is_trading_day(d(2024, 1, 1)));
    }

    #[test]
    fn session_instants_follow_dst() {
        let cal = ExchangeCalendar::nyse();
        // January: EST (UTC-5). June: EDT (UTC-4).
        assert_eq!(cal.session_open(d(2024, 1, 8)).to_rfc3339(), "2024-01-08T14:30:00+00:00");
        assert_eq!(cal.session_open(d(2024, 6, 12)).to_rfc3339(), "2024-06-12T13:30:00+00:00");
        assert_eq!(cal.session_close(d(2024, 6, 12)).to_rfc3339(), "2024-06-12T20:00:00+00:00");
    }

    #[test]
    fn early_close_day_closes_at_one() {
        let cal = ExchangeCalendar::nyse();
        assert_eq!(cal.session_close(d(2024, 11, 29)).to_rfc3339(), "2024-11-29T18:00:00+00:00");
    }

    #[test]
    fn monday_window_starts_at_friday_close() {
        let cal = ExchangeCalendar::nyse();
        let (start, end) = cal.day_window(d(2024, 6, 10));
        assert_eq!(start, cal.session_close(d(2024, 6, 7)));
        assert_eq!(end, cal.session_close(d(2024, 6, 10)));
    }

    #[test]
    fn after_close_activity_belongs_to_next_trading_day() {
        let cal = ExchangeCalendar::nyse();
        // Friday 2024-06-07 17:30 EDT -> Monday 2024-06-10.
        let ts = Utc.with_ymd_and_hms(2024, 6, 7, 21, 30, 0).unwrap();
        assert_eq!(cal.trading_day_for(ts), d(2024, 6, 10));
        // Exactly at close stays on the same day.
        assert_eq!(cal.trading_day_for(cal.session_close(d(2024, 6, 7))), d(2024, 6, 7));
    }

    #[test]
    fn phase_of_splits_premarket_regular_close() {
        let cal = ExchangeCalendar::nyse();
        let day = d(2024, 6, 12);
        let pre = Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap();
        let mid = Utc.with_ymd_and_hms(2024, 6, 12, 15, 0, 0).unwrap();
        assert_eq!(cal.phase_of(day, pre), SessionPhase::PreMarket);
        assert_eq!(cal.phase_of(day, mid), SessionPhase::Regular);
        assert_eq!(cal.phase_of(day, cal.session_close(day)), SessionPhase::AtClose);
    }

    #[test]
    fn always_on_trades_every_day() {
        let cal = ExchangeCalendar::always_on(chrono_tz::UTC);
        assert!(cal.is_trading_day(d(2024, 1, 6)));
        assert_eq!(cal.previous_trading_day(d(2024, 1, 7)), d(2024, 1, 6));
    }
}
