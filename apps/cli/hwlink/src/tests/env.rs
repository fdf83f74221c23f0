use crate::env::{
    CONFIG_DIR_VAR, DISABLE_HARDWARE_VAR, PathSource, apply_overrides, detect_paths, parse_flag,
};

use bridge_core::config::BridgeConfig;

use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn given_flag_spellings_when_parsing_then_case_insensitive_booleans() {
    for raw in ["1", "true", "YES", " on "] {
        assert_eq!(parse_flag(raw), Some(true), "{raw:?}");
    }
    for raw in ["0", "False", "no", "OFF"] {
        assert_eq!(parse_flag(raw), Some(false), "{raw:?}");
    }
    for raw in ["", "2", "enabled"] {
        assert_eq!(parse_flag(raw), None, "{raw:?}");
    }
}

/// **VALUE**: The environment can turn hardware off without editing the
/// config file.
///
/// **BUG THIS CATCHES**: Would catch the override being read but not written
/// back, or a garbage value silently flipping the flag.
#[test]
#[serial]
fn given_disable_var_when_applying_overrides_then_flag_follows_valid_values_only() {
    // GIVEN
    let mut config = BridgeConfig::default();

    // WHEN: A valid value
    unsafe { std::env::set_var(DISABLE_HARDWARE_VAR, "true") };
    apply_overrides(&mut config);

    // THEN
    assert!(config.disable_hardware);

    // WHEN: A garbage value
    unsafe { std::env::set_var(DISABLE_HARDWARE_VAR, "maybe") };
    apply_overrides(&mut config);

    // THEN: Unchanged
    assert!(config.disable_hardware);

    unsafe { std::env::remove_var(DISABLE_HARDWARE_VAR) };
}

#[test]
#[serial]
fn given_no_disable_var_when_applying_overrides_then_config_untouched() {
    // GIVEN
    unsafe { std::env::remove_var(DISABLE_HARDWARE_VAR) };
    let mut config = BridgeConfig::default();

    // WHEN
    apply_overrides(&mut config);

    // THEN
    assert_eq!(config, BridgeConfig::default());
}

#[test]
#[serial]
fn given_config_dir_var_when_detecting_paths_then_logs_nested_under_it() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    unsafe { std::env::set_var(CONFIG_DIR_VAR, dir.path()) };

    // WHEN
    let paths = detect_paths().unwrap();

    // THEN
    assert_eq!(paths.source, PathSource::EnvVar);
    assert_eq!(paths.config_dir, PathBuf::from(dir.path()));
    assert_eq!(paths.log_dir, dir.path().join("logs"));

    unsafe { std::env::remove_var(CONFIG_DIR_VAR) };
}

#[test]
#[serial]
fn given_blank_config_dir_var_when_detecting_paths_then_platform_default() {
    // GIVEN
    unsafe { std::env::set_var(CONFIG_DIR_VAR, "   ") };

    // WHEN
    let result = detect_paths();

    // THEN: Either the platform dirs, or a Path error on hosts without them
    if let Ok(paths) = result {
        assert_eq!(paths.source, PathSource::PlatformDefault);
        assert!(paths.log_dir.ends_with("hwlink/logs"));
    }

    unsafe { std::env::remove_var(CONFIG_DIR_VAR) };
}
