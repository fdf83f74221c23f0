use common::ErrorLocation;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while the host binary sets itself up.
///
/// Library errors are flattened into `Core` with their rendered message, so
/// the binary keeps one serializable error type with its own location.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum HwlinkError {
    /// Error from this app
    #[error("Hwlink Error: {message} {location}")]
    Hwlink {
        message: String,
        location: ErrorLocation,
    },

    /// Error from bridge-core (config, identity, session)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// No usable directory for config or logs
    #[error("Path Error: {message} {location}")]
    Path {
        message: String,
        location: ErrorLocation,
    },
}
