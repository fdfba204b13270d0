//! Day windows must tile the timeline: every instant belongs to exactly one
//! trading day, across weekends, holidays and DST switches.
//!
//!   2024-03-08 Fri: last EST session before DST
//!   2024-03-11 Mon: first EDT session
//!   2024-03-29 Fri: Good Friday (NYSE holiday)

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use nav_calendar::ExchangeCalendar;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn consecutive_windows_share_their_boundary() {
    let cal = ExchangeCalendar::nyse();
    let days = cal.trading_days(d(2024, 3, 1), d(2024, 4, 5));
    assert!(!days.contains(&d(2024, 3, 29)), "Good Friday must be skipped");

    for pair in days.windows(2) {
        let (_, prev_end) = cal.day_window(pair[0]);
        let (next_start, _) = cal.day_window(pair[1]);
        assert_eq!(prev_end, next_start, "gap between {} and {}", pair[0], pair[1]);
    }
}

#[test]
fn weekend_activity_rolls_into_monday_across_dst() {
    let cal = ExchangeCalendar::nyse();
    // Sunday 2024-03-10 after the DST switch.
    let ts = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
    assert_eq!(cal.trading_day_for(ts), d(2024, 3, 11));

    let (start, end) = cal.day_window(d(2024, 3, 11));
    assert!(ts > start && ts <= end);
    // Friday close is 21:00Z (EST); Monday close is 20:00Z (EDT).
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 8, 21, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 11, 20, 0, 0).unwrap());
}

#[test]
fn holiday_window_spans_two_calendar_days() {
    let cal = ExchangeCalendar::nyse();
    let (start, end) = cal.day_window(d(2024, 4, 1));
    assert_eq!(end - start, Duration::days(4));
}
