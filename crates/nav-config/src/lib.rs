//! nav-config
//!
//! Layered YAML configuration for the NAV engine.
//!
//! Files are merged in order (later layers override earlier ones), converted
//! to JSON, canonicalised with sorted keys and hashed (SHA-256) so every run
//! can record exactly which configuration produced it. Secrets never live in
//! YAML: the config stores env var NAMES, resolved once by
//! [`resolve_secrets`].

mod consumption;
mod engine;
mod secrets;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;

pub use consumption::{
    consumed_pointers_for_scope, report_unused_keys, ConfigScope, UnusedKeyPolicy,
    UnusedKeyReport,
};
pub use engine::{
    AuditConfig, BackoffConfig, BackoffStrategy, CalendarConfig, CalendarKind, EngineConfig,
    FetchConfig, FxConfig, FxSource, LedgerConfig, LiveConfig, NarrativeConfig, ReconcileConfig,
};
pub use secrets::{resolve_secrets, ResolvedSecrets};

/// Known secret-like prefixes. A leaf string value starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
    "Bearer ",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view with defaults applied and values validated.
    pub fn engine(&self) -> Result<EngineConfig> {
        EngineConfig::from_config_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(&sort_keys(v)).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                if let Some(child) = map.get(k) {
                    out.insert(k.clone(), sort_keys(child));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.trim().len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layer_overrides_nested_key_only() {
        let base = "fetch:\n  base_url: \"https://reports.example\"\n  backoff:\n    max_attempts: 10\n";
        let over = "fetch:\n  backoff:\n    max_attempts: 3\n";
        let loaded = load_layered_yaml_from_strings(&[base, over]).unwrap();
        assert_eq!(
            loaded.config_json.pointer("/fetch/backoff/max_attempts"),
            Some(&serde_json::json!(3))
        );
        assert_eq!(
            loaded.config_json.pointer("/fetch/base_url"),
            Some(&serde_json::json!("https://reports.example"))
        );
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let v = serde_json::json!({"b": 1, "a": {"z": 1, "y": 2}});
        assert_eq!(canonicalize_json(&v).unwrap(), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn secret_literal_is_rejected() {
        let yaml = "fetch:\n  token_env: \"sk_live_abcdefgh12345\"\n";
        let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CONFIG_SECRET_DETECTED"));
        assert!(msg.contains("/fetch/token_env"));
        assert!(!msg.contains("abcdefgh"), "value must be redacted");
    }

    #[test]
    fn empty_layer_is_ignored() {
        let a = load_layered_yaml_from_strings(&["reporting_currency: EUR\n"]).unwrap();
        let b = load_layered_yaml_from_strings(&["reporting_currency: EUR\n", ""]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }
}
