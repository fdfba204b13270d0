//! Batch paths: fetch, CSV import, narration and the full daily run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use nav_config::ConfigScope;
use nav_fetch::{read_report_csv, ReportPeriod};
use nav_runtime::{DailyJob, OfficialNav};

use super::{connect_store, load_config, parse_period, print_json, report_fetcher};

/// Fetch `period` from the reporting API and ingest it.
pub async fn fetch(config_paths: &[String], period: &str, date: NaiveDate) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths, ConfigScope::Batch)?;
    let period = parse_period(period, date)?;
    let fetcher = report_fetcher(&cfg)?;
    let store = connect_store(&cfg).await?;
    let mut job = DailyJob::new(&cfg, &store)?.with_configured_audit()?;
    info!(run_id = %job.run_id(), config_hash = %loaded.config_hash, period = %period.period_key(), "fetch");

    let report = job.fetch(&fetcher, &period).await?;
    let outcome = job.ingest_report(&period.period_key(), &report).await?;
    print_json(&outcome)
}

/// Ingest a CSV export covering `start..=end` (a single day when `end` is absent).
pub async fn import_csv(
    config_paths: &[String],
    path: &Path,
    account: &str,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<()> {
    let (_loaded, cfg) = load_config(config_paths, ConfigScope::Batch)?;
    let period = match end {
        Some(end) if end != start => ReportPeriod::range(start, end),
        _ => ReportPeriod::single_day(start),
    };
    let report = read_report_csv(path, account, &period)
        .with_context(|| format!("import csv {}", path.display()))?;
    let store = connect_store(&cfg).await?;
    let mut job = DailyJob::new(&cfg, &store)?.with_configured_audit()?;
    let outcome = job.ingest_report(&period.period_key(), &report).await?;
    print_json(&outcome)
}

/// Official figures given on the command line.
pub struct OfficialArgs {
    pub official_open: Option<Decimal>,
    pub official_close: Decimal,
    pub previous_close: Option<Decimal>,
}

impl OfficialArgs {
    fn officials(&self) -> OfficialNav {
        OfficialNav {
            opening: self.official_open,
            closing: self.official_close,
        }
    }
}

/// Narrate and reconcile one day from what the ledger already holds.
pub async fn narrate(config_paths: &[String], date: NaiveDate, args: OfficialArgs) -> Result<()> {
    let (_loaded, cfg) = load_config(config_paths, ConfigScope::Batch)?;
    let store = connect_store(&cfg).await?;
    let mut job = DailyJob::new(&cfg, &store)?.with_configured_audit()?;
    let out = job.narrate(date, args.officials(), args.previous_close).await?;
    print_json(&out)
}

/// Source of the historical report for a daily run.
pub enum HistoricalSource<'a> {
    /// Month-to-date pull from the reporting API.
    Api,
    Csv { path: &'a Path, account: &'a str },
    Skip,
}

pub async fn run_daily(
    config_paths: &[String],
    date: NaiveDate,
    source: HistoricalSource<'_>,
    with_live: bool,
    args: OfficialArgs,
) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths, ConfigScope::Batch)?;
    let store = connect_store(&cfg).await?;
    let mut job = DailyJob::new(&cfg, &store)?.with_configured_audit()?;
    info!(run_id = %job.run_id(), config_hash = %loaded.config_hash, %date, "daily run");

    let period = ReportPeriod::month_to_date(date);
    let report = match source {
        HistoricalSource::Api => {
            let fetcher = report_fetcher(&cfg)?;
            Some(job.fetch(&fetcher, &period).await?)
        }
        HistoricalSource::Csv { path, account } => Some(
            read_report_csv(path, account, &period)
                .with_context(|| format!("import csv {}", path.display()))?,
        ),
        HistoricalSource::Skip => None,
    };

    let live = if with_live {
        Some(super::live::pull(&cfg).await?)
    } else {
        None
    };

    let key = period.period_key();
    let outcome = job
        .run_daily(
            date,
            report.as_ref().map(|r| (key.as_str(), r)),
            live.as_ref(),
            args.officials(),
            args.previous_close,
        )
        .await?;
    print_json(&outcome)
}

