//! Fixtures and scenario helpers shared by the cross-crate tests.

mod builders;
mod scenario;

use anyhow::{Context, Result};
use nav_fetch::{read_report_csv, ReportPeriod};
use nav_schemas::RawReport;
use std::fs;
use std::path::PathBuf;

pub use builders::{assignment, cash, expiration, option, report, stock, trade};
pub use scenario::{block_pnl_total, check_continuity, run_scenario, ScenarioDay};

/// Absolute path of a file under `nav-testkit/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

pub fn load_report_json(name: &str) -> Result<RawReport> {
    let path = fixture_path(name);
    let s = fs::read_to_string(&path).with_context(|| format!("read fixture: {}", path.display()))?;
    let report: RawReport = serde_json::from_str(&s).context("parse report json")?;
    Ok(report)
}

pub fn load_report_csv(name: &str, account_id: &str, period: &ReportPeriod) -> Result<RawReport> {
    read_report_csv(&fixture_path(name), account_id, period)
}
