use crate::config::{BridgeConfig, CONFIG_FILE_NAME};
use crate::error::config::ConfigError;
use crate::{BRIDGE_LOOPBACK_URL, BRIDGE_RELAY_PRIMARY_URL, BRIDGE_RELAY_SECONDARY_URL};

use std::time::Duration;

use tempfile::TempDir;

#[test]
fn given_missing_file_when_loading_then_defaults_returned() {
    // GIVEN: An empty config dir
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = BridgeConfig::load(dir.path()).unwrap();

    // THEN: Defaults target the loopback bridge and both relays
    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.transport.loopback_url, BRIDGE_LOOPBACK_URL);
    assert_eq!(
        config.transport.relay_urls,
        vec![BRIDGE_RELAY_PRIMARY_URL, BRIDGE_RELAY_SECONDARY_URL]
    );
    assert_eq!(config.tick_interval(), Duration::from_millis(100));
}

/// **VALUE**: Default reconnect policy matches the documented limits.
///
/// **WHY THIS MATTERS**: A dead loopback port must fail fast. Two retries at
/// most one second apart, one second per attempt, and five retries once the
/// launch flow is in use.
#[test]
fn given_default_config_when_policy_built_then_limits_match_defaults() {
    // GIVEN: Default config
    let config = BridgeConfig::default();

    // WHEN: Building the policy and raising it
    let mut policy = config.reconnect_policy();
    let before = policy;
    policy.raise_attempts();

    // THEN: 2 attempts raised to 5, capped delay and short timeout
    assert_eq!(before.attempts, 2);
    assert_eq!(policy.attempts, 5);
    assert_eq!(before.delay, Duration::from_millis(500));
    assert_eq!(before.delay_max, Duration::from_secs(1));
    assert_eq!(before.timeout, Duration::from_secs(1));
}

#[test]
fn given_partial_file_when_loading_then_missing_fields_defaulted() {
    // GIVEN: A file that only overrides two values
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "secure_host = true\n\n[transport]\nreconnection_attempts = 3\n",
    )
    .unwrap();

    // WHEN: Loading
    let config = BridgeConfig::load(dir.path()).unwrap();

    // THEN: Overrides applied, everything else defaulted
    assert!(config.secure_host);
    assert_eq!(config.transport.reconnection_attempts, 3);
    assert_eq!(config.transport.launched_reconnection_attempts, 5);
    assert_eq!(config.launcher.relaunch_delay_ms, 1000);
}

#[test]
fn given_config_when_saved_and_loaded_then_same_values() {
    // GIVEN: A non-default config
    let dir = TempDir::new().unwrap();
    let mut config = BridgeConfig::default();
    config.disable_hardware = true;
    config.tick_interval_ms = 50;
    config.launcher.program_path = Some("/opt/bridge/bridge".into());

    // WHEN: Saving then loading
    config.save(dir.path()).unwrap();
    let loaded = BridgeConfig::load(dir.path()).unwrap();

    // THEN: Round trip preserved, no temp file left
    assert_eq!(loaded, config);
    assert!(!dir.path().join(format!("{CONFIG_FILE_NAME}.tmp")).exists());
}

#[test]
fn given_invalid_toml_when_loading_then_parse_error() {
    // GIVEN: Broken TOML
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "tick_interval_ms = [").unwrap();

    // WHEN: Loading
    let result = BridgeConfig::load(dir.path());

    // THEN: Parse error naming the file
    match result {
        Err(ConfigError::ParseError { path, .. }) => {
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

/// **VALUE**: Every validation rule rejects its bad value.
///
/// **BUG THIS CATCHES**: Would catch a rule being dropped, e.g. a zero tick
/// interval that would spin the update pump.
#[test]
fn given_invalid_values_when_validating_then_each_rejected() {
    // GIVEN: One mutation per rule
    let mutations: Vec<(&str, fn(&mut BridgeConfig))> = vec![
        ("tick", |c: &mut BridgeConfig| c.tick_interval_ms = 0),
        ("timeout", |c: &mut BridgeConfig| c.transport.timeout_ms = 0),
        ("delay", |c: &mut BridgeConfig| c.transport.reconnection_delay_ms = 5000),
        ("launched", |c: &mut BridgeConfig| c.transport.launched_reconnection_attempts = 1),
        ("relays", |c: &mut BridgeConfig| c.transport.relay_urls.clear()),
        ("scheme", |c: &mut BridgeConfig| c.transport.loopback_url = "ftp://127.0.0.1".to_string()),
        ("probe", |c: &mut BridgeConfig| c.transport.legacy_probe_url = "hardware".to_string()),
    ];

    for (rule, mutate) in mutations {
        let mut config = BridgeConfig::default();
        mutate(&mut config);

        // WHEN: Validating
        let result = config.validate();

        // THEN: Validation error
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Rule {rule} should reject, got {result:?}"
        );
    }
}

#[test]
fn given_invalid_config_when_saving_then_nothing_written() {
    // GIVEN: An invalid config
    let dir = TempDir::new().unwrap();
    let mut config = BridgeConfig::default();
    config.tick_interval_ms = 0;

    // WHEN: Saving
    let result = config.save(dir.path());

    // THEN: Rejected before touching the disk
    assert!(result.is_err());
    assert!(!dir.path().join(CONFIG_FILE_NAME).exists());
}
