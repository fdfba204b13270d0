//! Command handler modules for nav-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod daily;
pub mod live;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use nav_config::{
    report_unused_keys, resolve_secrets, ConfigScope, EngineConfig, LoadedConfig, UnusedKeyPolicy,
};
use nav_db::PgLedgerStore;
use nav_fetch::{BackoffPolicy, HttpReportApi, ReportFetcher, ReportPeriod};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config, warn about keys nothing in `scope` reads, and return
/// the validated typed view.
pub fn load_config(paths: &[String], scope: ConfigScope) -> Result<(LoadedConfig, EngineConfig)> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = nav_config::load_layered_yaml(&path_refs)?;
    let report = report_unused_keys(scope, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(
            scope = %report.scope,
            unused = ?report.unused_leaf_pointers,
            "config keys not read in this scope"
        );
    }
    let cfg = loaded.engine()?;
    Ok((loaded, cfg))
}

/// Parse a CLI `--period` string into a [`ReportPeriod`] ending on `date`.
pub fn parse_period(period: &str, date: NaiveDate) -> Result<ReportPeriod> {
    match period.trim().to_lowercase().as_str() {
        "mtd" => Ok(ReportPeriod::month_to_date(date)),
        "day" => Ok(ReportPeriod::single_day(date)),
        other => bail!("invalid --period '{}'. expected one of: mtd | day", other),
    }
}

pub async fn connect_store(cfg: &EngineConfig) -> Result<PgLedgerStore> {
    let pool = nav_db::connect_from_env().await?;
    Ok(PgLedgerStore::new(pool, cfg.grace_window()))
}

/// Reporting API client built from config plus the token env var it names.
pub fn report_fetcher(cfg: &EngineConfig) -> Result<ReportFetcher<HttpReportApi>> {
    let base_url = cfg
        .fetch
        .base_url
        .clone()
        .context("fetch.base_url is not configured; use import-csv for offline data")?;
    let query_id = cfg
        .fetch
        .query_id
        .clone()
        .context("fetch.query_id is not configured")?;
    let secrets = resolve_secrets(cfg);
    let token = secrets.require_report_token(cfg)?.to_string();
    Ok(ReportFetcher::new(
        HttpReportApi::new(base_url, query_id, token),
        BackoffPolicy::from_config(&cfg.fetch.backoff),
    ))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{s}");
    Ok(())
}
