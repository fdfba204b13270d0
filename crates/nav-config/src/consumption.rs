//! Unused-key guard.
//!
//! "Consumed pointers" are JSON Pointer prefixes. A leaf pointer under any
//! consumed prefix is considered read; every other leaf is reported as
//! unused so that typos (`narative.grouping_window_minutes`) surface instead
//! of silently falling back to defaults.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::collect_leaf_pointers;

/// Which entry point is reading the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Scheduled daily batch: fetch, classify, store, narrate, reconcile.
    Batch,
    /// On-demand live session path.
    Live,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::Batch => "BATCH",
            ConfigScope::Live => "LIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub scope: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Registry of consumed JSON-pointer prefixes per scope. Must only list
/// what `EngineConfig` and its callers actually read in that scope.
pub fn consumed_pointers_for_scope(scope: ConfigScope) -> &'static [&'static str] {
    match scope {
        ConfigScope::Batch => &[
            "/reporting_currency",
            "/narrative/grouping_window_minutes",
            "/fetch/base_url",
            "/fetch/query_id",
            "/fetch/token_env",
            "/fetch/backoff",
            "/reconcile/materiality_threshold",
            "/fx/source",
            "/fx/rate",
            "/ledger/grace_window_days",
            "/calendar",
            "/audit/path",
            "/audit/hash_chain",
            // Batch runs also pull the live session for today.
            "/live",
        ],
        ConfigScope::Live => &[
            "/reporting_currency",
            "/fx/source",
            "/fx/rate",
            "/calendar",
            "/ledger/grace_window_days",
            "/live",
        ],
    }
}

/// Produce an unused-key report for `scope`.
/// With `Fail`, returns an error when unused keys exist; with `Warn`, always Ok.
pub fn report_unused_keys(
    scope: ConfigScope,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for_scope(scope)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        scope: scope.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (scope={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.scope,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_respects_token_boundary() {
        assert!(is_prefix_pointer("/fx", "/fx/rate"));
        assert!(is_prefix_pointer("/fx/rate", "/fx/rate"));
        assert!(!is_prefix_pointer("/fx", "/fxx/rate"));
    }

    #[test]
    fn normalize_adds_leading_and_strips_trailing_slash() {
        assert_eq!(normalize_pointer("live/"), "/live");
        assert_eq!(normalize_pointer(""), "/");
    }
}
