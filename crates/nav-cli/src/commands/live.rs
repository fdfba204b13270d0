use anyhow::{Context, Result};
use tracing::warn;

use nav_config::{resolve_secrets, ConfigScope, EngineConfig};
use nav_live::{HttpLiveSessionApi, LiveDataAdapter, LiveDay, LiveStatus};
use nav_runtime::DailyJob;

use super::{connect_store, load_config, print_json};

/// Pull today's provisional view from the live session. Never fails on a
/// slow or broken session; the status says what happened.
pub async fn pull(cfg: &EngineConfig) -> Result<LiveDay> {
    let base_url = cfg
        .live
        .base_url
        .clone()
        .context("live.base_url is not configured")?;
    let token = resolve_secrets(cfg).live_token.with_context(|| {
        format!(
            "SECRETS_MISSING: required env var '{}' (live session token) is not set or empty",
            cfg.live.token_env
        )
    })?;
    let adapter = LiveDataAdapter::new(HttpLiveSessionApi::new(base_url, token), cfg);
    let day = adapter.current_day_events().await;
    if day.status != LiveStatus::Ok {
        warn!(status = ?day.status, events = day.events.len(), "live session degraded");
    }
    Ok(day)
}

pub async fn live(config_paths: &[String], store: bool) -> Result<()> {
    let (_loaded, cfg) = load_config(config_paths, ConfigScope::Live)?;
    let day = pull(&cfg).await?;
    if store {
        let ledger = connect_store(&cfg).await?;
        let mut job = DailyJob::new(&cfg, &ledger)?;
        let upsert = job.ingest_live(&day, None).await?;
        println!("live_stored={} unchanged={}", upsert.inserted + upsert.updated, upsert.unchanged);
    }
    print_json(&day)
}
