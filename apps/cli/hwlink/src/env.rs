//! Process environment for the host: `.env` loading, directories and
//! config overrides.

use crate::error::HwlinkError;

use bridge_core::config::BridgeConfig;

use common::ErrorLocation;

use std::env;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::path::PathBuf;

use log::{debug, info, warn};

pub const CONFIG_DIR_VAR: &str = "HWLINK_CONFIG_DIR";
pub const DISABLE_HARDWARE_VAR: &str = "HWLINK_DISABLE_HARDWARE";

const APP_DIR_NAME: &str = "hwlink";
const LOG_DIR_NAME: &str = "logs";

/// Where the host keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub source: PathSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    EnvVar,
    PlatformDefault,
}

impl Display for PathSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            PathSource::EnvVar => write!(f, "{CONFIG_DIR_VAR}"),
            PathSource::PlatformDefault => write!(f, "platform default"),
        }
    }
}

/// Load `.env` from the working directory, then next to the executable.
///
/// Returns the file that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        return Some(path);
    }

    let exe_dir = env::current_exe().ok()?.parent()?.to_path_buf();
    let env_path = exe_dir.join(".env");
    if !env_path.exists() {
        return None;
    }

    match dotenvy::from_path(&env_path) {
        Ok(()) => Some(env_path),
        Err(e) => {
            warn!("Failed to parse .env at {}: {e}", env_path.display());
            None
        }
    }
}

/// Resolve config and log directories.
///
/// `HWLINK_CONFIG_DIR` wins and holds both (logs under `logs/`). Otherwise
/// the platform config dir holds `bridge.toml` and the platform local-data
/// dir holds the logs.
///
/// # Errors
///
/// Returns `HwlinkError::Path` if the platform reports no directories.
#[track_caller]
pub fn detect_paths() -> Result<HostPaths, HwlinkError> {
    if let Ok(custom_dir) = env::var(CONFIG_DIR_VAR)
        && !custom_dir.trim().is_empty()
    {
        let config_dir = PathBuf::from(custom_dir.trim());
        return Ok(HostPaths {
            log_dir: config_dir.join(LOG_DIR_NAME),
            config_dir,
            source: PathSource::EnvVar,
        });
    }

    let config_dir = BridgeConfig::default_dir().map_err(|e| HwlinkError::Path {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let log_dir = dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(LOG_DIR_NAME))
        .ok_or_else(|| HwlinkError::Path {
            message: "Platform has no local data directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(HostPaths {
        config_dir,
        log_dir,
        source: PathSource::PlatformDefault,
    })
}

/// Apply `HWLINK_DISABLE_HARDWARE` on top of the loaded config.
///
/// An unparseable value is ignored with a warning.
pub fn apply_overrides(config: &mut BridgeConfig) {
    let Ok(raw) = env::var(DISABLE_HARDWARE_VAR) else {
        return;
    };

    match parse_flag(&raw) {
        Some(disabled) => {
            info!("{DISABLE_HARDWARE_VAR}={disabled} overrides the config file");
            config.disable_hardware = disabled;
        }
        None => warn!("Ignoring {DISABLE_HARDWARE_VAR}: {raw:?} is not a boolean"),
    }
}

/// `1/true/yes/on` and `0/false/no/off`, case-insensitive.
pub fn parse_flag(raw: &str) -> Option<bool> {
    let value = raw.trim().to_ascii_lowercase();
    debug!("Parsing flag value {value:?}");
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
