//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`fetch.token_env`,
//! `live.token_env`). Callers resolve them once at startup and pass the
//! result into client constructors. `Debug` redacts every value and error
//! messages name the variable, never its content.

use anyhow::{bail, Result};

use crate::EngineConfig;

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Reporting API token. `None` when the named env var is unset or blank.
    pub report_token: Option<String>,
    /// Live session API token.
    pub live_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("report_token", &self.report_token.as_ref().map(|_| "<REDACTED>"))
            .field("live_token", &self.live_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// Error unless the reporting token is present. Required only when a
    /// remote fetch is about to happen.
    pub fn require_report_token(&self, cfg: &EngineConfig) -> Result<&str> {
        match self.report_token.as_deref() {
            Some(t) => Ok(t),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (report api token) is not set or empty",
                cfg.fetch.token_env
            ),
        }
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every token named in `cfg` from the process environment.
/// Missing tokens are `None`; enforcement is up to the caller.
pub fn resolve_secrets(cfg: &EngineConfig) -> ResolvedSecrets {
    ResolvedSecrets {
        report_token: resolve_env(&cfg.fetch.token_env),
        live_token: resolve_env(&cfg.live.token_env),
    }
}
