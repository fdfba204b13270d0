use anyhow::{bail, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use nav_db::LedgerStore;
use nav_narrative::DailyNarrative;
use nav_runtime::{DailyJob, DailyRunOutcome, OfficialNav};
use nav_schemas::RawReport;

/// One scripted trading day: what the report says and what the broker
/// published.
pub struct ScenarioDay {
    pub date: NaiveDate,
    pub report: Option<(String, RawReport)>,
    pub officials: OfficialNav,
}

impl ScenarioDay {
    pub fn new(date: NaiveDate, closing: Decimal) -> Self {
        Self {
            date,
            report: None,
            officials: OfficialNav {
                opening: None,
                closing,
            },
        }
    }

    pub fn with_open(mut self, opening: Decimal) -> Self {
        self.officials.opening = Some(opening);
        self
    }

    pub fn with_report(mut self, period_key: &str, report: RawReport) -> Self {
        self.report = Some((period_key.to_string(), report));
        self
    }
}

/// Run `days` in order through `job`. Only the first day takes
/// `starting_close`; later days read the previous close from the ledger.
pub async fn run_scenario<S: LedgerStore + ?Sized>(
    job: &mut DailyJob<'_, S>,
    starting_close: Decimal,
    days: &[ScenarioDay],
) -> Result<Vec<DailyRunOutcome>> {
    let mut out = Vec::with_capacity(days.len());
    for (i, day) in days.iter().enumerate() {
        let previous_close = (i == 0).then_some(starting_close);
        let historical = day.report.as_ref().map(|(k, r)| (k.as_str(), r));
        out.push(
            job.run_daily(day.date, historical, None, day.officials, previous_close)
                .await?,
        );
    }
    Ok(out)
}

pub fn block_pnl_total(n: &DailyNarrative) -> Decimal {
    n.blocks.iter().map(|b| b.pnl).sum()
}

/// Every day's blocks must bridge its previous official close to its own,
/// and each day must start where the previous one ended.
pub fn check_continuity(starting_close: Decimal, outcomes: &[DailyRunOutcome]) -> Result<()> {
    let mut previous = starting_close;
    for o in outcomes {
        let n = &o.day.narrative;
        let close = n.record.official_closing_nav;
        let total = block_pnl_total(n);
        if total != close - previous {
            bail!(
                "{}: blocks sum to {} but official close moved {}",
                n.date,
                total,
                close - previous
            );
        }
        if let Some(last) = n.blocks.last() {
            if last.nav_after != close {
                bail!("{}: last block ends at {} not {}", n.date, last.nav_after, close);
            }
        }
        previous = close;
    }
    Ok(())
}
