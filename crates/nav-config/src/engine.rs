//! Typed engine configuration.
//!
//! Every section has defaults so a minimal YAML (or none at all) yields a
//! working dry-run configuration. Values are validated once, here, instead of
//! at each use site.

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Grouping spans at most one calendar day.
pub const MAX_GROUPING_WINDOW_MINUTES: i64 = 24 * 60;
/// Ten years; beyond this nothing would ever freeze.
pub const MAX_GRACE_WINDOW_DAYS: i64 = 3_660;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ISO code every NAV figure is expressed in.
    pub reporting_currency: String,
    pub narrative: NarrativeConfig,
    pub fetch: FetchConfig,
    pub reconcile: ReconcileConfig,
    pub fx: FxConfig,
    pub ledger: LedgerConfig,
    pub live: LiveConfig,
    pub calendar: CalendarConfig,
    pub audit: AuditConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reporting_currency: "USD".to_string(),
            narrative: NarrativeConfig::default(),
            fetch: FetchConfig::default(),
            reconcile: ReconcileConfig::default(),
            fx: FxConfig::default(),
            ledger: LedgerConfig::default(),
            live: LiveConfig::default(),
            calendar: CalendarConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Adjacent same-instrument trades closer than this collapse into one block.
    pub grouping_window_minutes: i64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            grouping_window_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub strategy: BackoffStrategy,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Hard ceiling on poll attempts; exhaustion is a retryable failure.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            initial_delay_ms: 5_000,
            max_delay_ms: 60_000,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Reporting API root. Absent = offline (CSV import only).
    pub base_url: Option<String>,
    pub query_id: Option<String>,
    /// Name of the env var holding the API token.
    pub token_env: String,
    pub backoff: BackoffConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            query_id: None,
            token_env: "NAV_REPORT_TOKEN".to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Absolute drift (reporting currency) above which a day is escalated.
    pub materiality_threshold: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: Decimal::new(5000, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FxSource {
    /// Use the per-event rate from the source; fall back to `fx.rate`.
    Event,
    /// Always use `fx.rate`, ignoring per-event rates.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub source: FxSource,
    pub rate: Decimal,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            source: FxSource::Event,
            rate: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Days after an event's timestamp during which same-source restatements
    /// are accepted. Older historical rows are frozen.
    pub grace_window_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            grace_window_days: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Live session API root. Absent = live path disabled.
    pub base_url: Option<String>,
    pub token_env: String,
    pub timeout_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: "NAV_LIVE_TOKEN".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    Nyse,
    AlwaysOn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub kind: CalendarKind,
    pub exchange_tz: Tz,
    /// `HH:MM` exchange-local.
    pub open: String,
    pub close: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            kind: CalendarKind::Nyse,
            exchange_tz: chrono_tz::America::New_York,
            open: "09:30".to_string(),
            close: "16:00".to_string(),
        }
    }
}

impl CalendarConfig {
    pub fn open_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.open).with_context(|| format!("calendar.open '{}'", self.open))
    }

    pub fn close_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.close).with_context(|| format!("calendar.close '{}'", self.close))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL audit log. Absent = audit disabled.
    pub path: Option<String>,
    pub hash_chain: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .context("expected HH:MM")
}

impl EngineConfig {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let cfg: EngineConfig = serde_json::from_value(config_json.clone())
            .context("engine config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reporting_currency.trim().len() != 3 {
            bail!(
                "CONFIG_INVALID reporting_currency='{}': expected a 3-letter ISO code",
                self.reporting_currency
            );
        }
        let minutes = self.narrative.grouping_window_minutes;
        if minutes <= 0 || minutes > MAX_GROUPING_WINDOW_MINUTES {
            bail!(
                "CONFIG_INVALID narrative.grouping_window_minutes={minutes}: expected 1..={MAX_GROUPING_WINDOW_MINUTES}"
            );
        }
        let b = &self.fetch.backoff;
        if b.max_attempts == 0 {
            bail!("CONFIG_INVALID fetch.backoff.max_attempts must be >= 1");
        }
        if b.initial_delay_ms > b.max_delay_ms {
            bail!(
                "CONFIG_INVALID fetch.backoff.initial_delay_ms ({}) exceeds max_delay_ms ({})",
                b.initial_delay_ms,
                b.max_delay_ms
            );
        }
        if self.reconcile.materiality_threshold.is_sign_negative() {
            bail!("CONFIG_INVALID reconcile.materiality_threshold must be >= 0");
        }
        if self.fx.rate <= Decimal::ZERO {
            bail!("CONFIG_INVALID fx.rate must be > 0");
        }
        let days = self.ledger.grace_window_days;
        if !(0..=MAX_GRACE_WINDOW_DAYS).contains(&days) {
            bail!("CONFIG_INVALID ledger.grace_window_days={days}: expected 0..={MAX_GRACE_WINDOW_DAYS}");
        }
        if self.live.timeout_ms == 0 {
            bail!("CONFIG_INVALID live.timeout_ms must be > 0");
        }
        let open = self.calendar.open_time()?;
        let close = self.calendar.close_time()?;
        if open >= close {
            bail!("CONFIG_INVALID calendar.open must precede calendar.close");
        }
        Ok(())
    }

    pub fn grouping_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(
            self.narrative
                .grouping_window_minutes
                .clamp(1, MAX_GROUPING_WINDOW_MINUTES),
        )
    }

    pub fn grace_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.ledger.grace_window_days.clamp(0, MAX_GRACE_WINDOW_DAYS))
    }

    pub fn live_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.live.timeout_ms)
    }
}
