use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodKind {
    MonthToDate,
    Day,
    Range,
}

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// First of `today`'s month through `today`. Re-fetched daily; the
    /// overlapping windows are what the ledger's idempotent upsert absorbs.
    pub fn month_to_date(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        Self {
            kind: PeriodKind::MonthToDate,
            start,
            end: today,
        }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            kind: PeriodKind::Day,
            start: date,
            end: date,
        }
    }

    /// Arbitrary range; `start` and `end` are swapped if given backwards.
    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            kind: PeriodKind::Range,
            start,
            end,
        }
    }

    /// Checkpoint key: `MTD:2024-06`, `DAY:2024-06-12`, `RANGE:2024-06-03..2024-06-07`.
    pub fn period_key(&self) -> String {
        match self.kind {
            PeriodKind::MonthToDate => format!("MTD:{}", self.start.format("%Y-%m")),
            PeriodKind::Day => format!("DAY:{}", self.start.format("%Y-%m-%d")),
            PeriodKind::Range => format!(
                "RANGE:{}..{}",
                self.start.format("%Y-%m-%d"),
                self.end.format("%Y-%m-%d")
            ),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_to_date_starts_on_the_first() {
        let p = ReportPeriod::month_to_date(d(2024, 6, 12));
        assert_eq!(p.start, d(2024, 6, 1));
        assert_eq!(p.end, d(2024, 6, 12));
        assert_eq!(p.period_key(), "MTD:2024-06");
    }

    #[test]
    fn mtd_key_is_stable_across_the_month() {
        // Daily re-fetches of the same month share one checkpoint key.
        assert_eq!(
            ReportPeriod::month_to_date(d(2024, 6, 3)).period_key(),
            ReportPeriod::month_to_date(d(2024, 6, 28)).period_key()
        );
    }

    #[test]
    fn day_and_range_keys() {
        assert_eq!(ReportPeriod::single_day(d(2024, 6, 12)).period_key(), "DAY:2024-06-12");
        let r = ReportPeriod::range(d(2024, 6, 7), d(2024, 6, 3));
        assert_eq!(r.start, d(2024, 6, 3));
        assert_eq!(r.period_key(), "RANGE:2024-06-03..2024-06-07");
        assert!(r.contains(d(2024, 6, 5)));
        assert!(!r.contains(d(2024, 6, 8)));
    }
}
