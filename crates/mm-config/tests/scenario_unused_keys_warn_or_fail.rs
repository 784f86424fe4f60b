//! Scenario: unused-key guard.
//!
//! # Invariants under test
//!
//! 1. Unused keys are reported under `Warn` without error.
//! 2. Unused keys fail the check under `Fail`.
//! 3. Every key `ManagerConfig` reads counts as consumed.
//! 4. Unused pointers come back sorted.

use mm_config::{
    load_layered_yaml_from_strings, report_unused_keys, ManagerConfig, UnusedKeyPolicy,
};

const FULL_YAML: &str = r#"
reconcile:
  suppression_ttl_ms: 1500
approval:
  timeout_secs: 300
timer:
  warning_lead_secs: 120
matches:
  single_match: true
  spectator_zone: true
  name_prefix: "Scrim"
store:
  namespace: "guild-1"
daemon:
  addr: "0.0.0.0:9000"
"#;

#[test]
fn every_read_key_is_consumed() {
    let loaded = load_layered_yaml_from_strings(&[FULL_YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean(), "{:?}", report.unused_leaf_pointers);

    let cfg = ManagerConfig::from_config_json(&loaded.config_json).unwrap();
    assert!(cfg.single_match);
    assert!(cfg.spectator_zone);
    assert_eq!(cfg.name_prefix, "Scrim");
    assert_eq!(cfg.store_namespace, "guild-1");
    assert_eq!(cfg.suppression_ttl.as_millis(), 1500);
    assert_eq!(cfg.warning_lead.as_secs(), 120);
    assert_eq!(cfg.daemon_addr.port(), 9000);
}

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
matches:
  single_match: true
  max_players: 10
legacy:
  channel: "general"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/legacy/channel".to_string(), "/matches/max_players".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
timer:
  warning_lead_secs: 60
  sound: "bell"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("/timer/sound"), "{msg}");
}

#[test]
fn unused_pointers_are_sorted() {
    let yaml = r#"
unused:
  b: 2
  a: 1
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()]
    );
}
