//! Bridge session configuration.
//!
//! Loaded from `{config_dir}/bridge.toml`. Every field has a default, so a
//! missing file (or a missing section) yields a working configuration that
//! targets the local bridge plus both relays.

use crate::error::config::ConfigError;
use crate::transport::ReconnectPolicy;
use crate::{
    BRIDGE_LOOPBACK_URL, BRIDGE_RELAY_PRIMARY_URL, BRIDGE_RELAY_SECONDARY_URL, LEGACY_PROBE_URL,
};

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "bridge.toml";
const APP_DIR_NAME: &str = "hwlink";
const ALLOWED_URL_SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_loopback_url")]
    pub loopback_url: String,
    #[serde(default = "default_relay_urls")]
    pub relay_urls: Vec<String>,
    #[serde(default = "default_legacy_probe_url")]
    pub legacy_probe_url: String,
    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,
    #[serde(default = "default_launched_reconnection_attempts")]
    pub launched_reconnection_attempts: u32,
    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,
    #[serde(default = "default_reconnection_delay_max_ms")]
    pub reconnection_delay_max_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            loopback_url: default_loopback_url(),
            relay_urls: default_relay_urls(),
            legacy_probe_url: default_legacy_probe_url(),
            reconnection_attempts: default_reconnection_attempts(),
            launched_reconnection_attempts: default_launched_reconnection_attempts(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            reconnection_delay_max_ms: default_reconnection_delay_max_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_path: Option<PathBuf>,
    #[serde(default = "default_relaunch_delay_ms")]
    pub relaunch_delay_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program_path: None,
            relaunch_delay_ms: default_relaunch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Keep every hardware feature inert: no transport is ever opened.
    #[serde(default)]
    pub disable_hardware: bool,

    /// The host surface is served over a secure scheme, so the plain
    /// loopback candidate is not attempted.
    #[serde(default)]
    pub secure_host: bool,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            disable_hardware: false,
            secure_host: false,
            tick_interval_ms: default_tick_interval_ms(),
            transport: TransportConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_loopback_url() -> String {
    BRIDGE_LOOPBACK_URL.to_string()
}
fn default_relay_urls() -> Vec<String> {
    vec![
        BRIDGE_RELAY_PRIMARY_URL.to_string(),
        BRIDGE_RELAY_SECONDARY_URL.to_string(),
    ]
}
fn default_legacy_probe_url() -> String {
    LEGACY_PROBE_URL.to_string()
}
fn default_reconnection_attempts() -> u32 {
    2
}
fn default_launched_reconnection_attempts() -> u32 {
    5
}
fn default_reconnection_delay_ms() -> u64 {
    500
}
fn default_reconnection_delay_max_ms() -> u64 {
    1000
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_relaunch_delay_ms() -> u64 {
    1000
}
fn default_tick_interval_ms() -> u64 {
    100
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// Default config directory: `{platform config dir}/hwlink`.
    #[track_caller]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| ConfigError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
                reason: "Platform has no config directory".to_string(),
            })
    }

    /// Load config from `{config_dir}/bridge.toml`.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error; callers decide whether to fall back.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BridgeConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/bridge.toml` using temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(validation_error("tick_interval_ms must be greater than 0"));
        }

        let transport = &self.transport;

        if transport.timeout_ms == 0 {
            return Err(validation_error("transport.timeout_ms must be greater than 0"));
        }

        if transport.reconnection_delay_ms > transport.reconnection_delay_max_ms {
            return Err(validation_error(format!(
                "transport.reconnection_delay_ms ({}) exceeds reconnection_delay_max_ms ({})",
                transport.reconnection_delay_ms, transport.reconnection_delay_max_ms
            )));
        }

        if transport.launched_reconnection_attempts < transport.reconnection_attempts {
            return Err(validation_error(format!(
                "transport.launched_reconnection_attempts ({}) is lower than reconnection_attempts ({})",
                transport.launched_reconnection_attempts, transport.reconnection_attempts
            )));
        }

        if transport.relay_urls.is_empty() {
            return Err(validation_error("transport.relay_urls cannot be empty"));
        }

        let urls = std::iter::once(&transport.loopback_url)
            .chain(transport.relay_urls.iter())
            .chain(std::iter::once(&transport.legacy_probe_url));

        for url in urls {
            if !ALLOWED_URL_SCHEMES
                .iter()
                .any(|scheme| url.starts_with(scheme))
            {
                return Err(validation_error(format!("Invalid URL format: {}", url)));
            }
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn relaunch_delay(&self) -> Duration {
        Duration::from_millis(self.launcher.relaunch_delay_ms)
    }

    /// Reconnect policy for a fresh session (launch flow not yet used).
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            attempts: self.transport.reconnection_attempts,
            raised_attempts: self.transport.launched_reconnection_attempts,
            delay: Duration::from_millis(self.transport.reconnection_delay_ms),
            delay_max: Duration::from_millis(self.transport.reconnection_delay_max_ms),
            timeout: Duration::from_millis(self.transport.timeout_ms),
        }
    }
}

#[track_caller]
fn validation_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}
