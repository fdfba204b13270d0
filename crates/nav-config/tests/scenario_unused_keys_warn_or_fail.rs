use nav_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigScope, UnusedKeyPolicy};

/// Validates:
/// 1) Typos are reported in WARN mode without error.
/// 2) FAIL mode turns them into an error.
/// 3) Keys under consumed prefixes are not flagged.
/// 4) The live scope does not consume batch-only sections.

const YAML: &str = r#"
reporting_currency: USD
narative:
  grouping_window_minutes: 15
fetch:
  backoff:
    max_attempts: 4
live:
  timeout_ms: 2000
"#;

#[test]
fn warn_mode_reports_misspelled_section() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigScope::Batch, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/narative/grouping_window_minutes".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigScope::Batch, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_UNUSED_KEYS"));
    assert!(err.contains("/narative/grouping_window_minutes"));
}

#[test]
fn live_scope_flags_batch_only_sections() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigScope::Live, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(report
        .unused_leaf_pointers
        .contains(&"/fetch/backoff/max_attempts".to_string()));
    assert!(!report
        .unused_leaf_pointers
        .contains(&"/live/timeout_ms".to_string()));
}

#[test]
fn shipped_base_config_is_clean_for_batch() {
    let base = include_str!("../../../config/base.yaml");
    let loaded = load_layered_yaml_from_strings(&[base]).unwrap();
    let report =
        report_unused_keys(ConfigScope::Batch, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
    loaded.engine().unwrap();
}
