// ---------------------------------------------------------------------------
// US market holiday / early-close tables 2023–2026
// ---------------------------------------------------------------------------

/// Returns `true` if (year, month, day) is a NYSE market holiday.
///
/// Hardcoded observed dates for 2023–2026. Extend as needed.
pub fn is_nyse_holiday(year: i64, month: i64, day: i64) -> bool {
    const HOLIDAYS: &[(i64, i64, i64)] = &[
        // ── 2023 ─────────────────────────────────────────────────────────
        (2023, 1, 2),   // New Year's Day (observed Mon)
        (2023, 1, 16),  // MLK Day
        (2023, 2, 20),  // Presidents' Day
        (2023, 4, 7),   // Good Friday
        (2023, 5, 29),  // Memorial Day
        (2023, 6, 19),  // Juneteenth
        (2023, 7, 4),   // Independence Day
        (2023, 9, 4),   // Labor Day
        (2023, 11, 23), // Thanksgiving
        (2023, 12, 25), // Christmas
        // ── 2024 ─────────────────────────────────────────────────────────
        (2024, 1, 1),   // New Year's Day
        (2024, 1, 15),  // MLK Day
        (2024, 2, 19),  // Presidents' Day
        (2024, 3, 29),  // Good Friday
        (2024, 5, 27),  // Memorial Day
        (2024, 6, 19),  // Juneteenth
        (2024, 7, 4),   // Independence Day
        (2024, 9, 2),   // Labor Day
        (2024, 11, 28), // Thanksgiving
        (2024, 12, 25), // Christmas
        // ── 2025 ─────────────────────────────────────────────────────────
        (2025, 1, 1),   // New Year's Day
        (2025, 1, 9),   // National day of mourning (President Carter)
        (2025, 1, 20),  // MLK Day
        (2025, 2, 17),  // Presidents' Day
        (2025, 4, 18),  // Good Friday
        (2025, 5, 26),  // Memorial Day
        (2025, 6, 19),  // Juneteenth
        (2025, 7, 4),   // Independence Day
        (2025, 9, 1),   // Labor Day
        (2025, 11, 27), // Thanksgiving
        (2025, 12, 25), // Christmas
        // ── 2026 ─────────────────────────────────────────────────────────
        (2026, 1, 1),   // New Year's Day
        (2026, 1, 19),  // MLK Day
        (2026, 2, 16),  // Presidents' Day
        (2026, 4, 3),   // Good Friday
        (2026, 5, 25),  // Memorial Day
        (2026, 6, 19),  // Juneteenth
        (2026, 7, 3),   // Independence Day (observed; July 4 falls on Saturday)
        (2026, 9, 7),   // Labor Day
        (2026, 11, 26), // Thanksgiving
        (2026, 12, 25), // Christmas
    ];
    HOLIDAYS.contains(&(year, month, day))
}

/// Returns `true` if (year, month, day) is a 13:00 ET early close.
pub fn is_early_close(year: i64, month: i64, day: i64) -> bool {
    const EARLY_CLOSES: &[(i64, i64, i64)] = &[
        (2023, 7, 3),
        (2023, 11, 24),
        (2024, 7, 3),
        (2024, 11, 29),
        (2024, 12, 24),
        (2025, 7, 3),
        (2025, 11, 28),
        (2025, 12, 24),
        (2026, 11, 27),
        (2026, 12, 24),
    ];
    EARLY_CLOSES.contains(&(year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_independence_day_2026() {
        assert!(is_nyse_holiday(2026, 7, 3));
        assert!(!is_nyse_holiday(2026, 7, 6));
    }

    #[test]
    fn holiday_and_early_close_tables_are_disjoint() {
        for (y, m, d) in [(2024, 11, 29), (2025, 12, 24), (2023, 7, 3)] {
            assert!(is_early_close(y, m, d));
            assert!(!is_nyse_holiday(y, m, d));
        }
    }
}
