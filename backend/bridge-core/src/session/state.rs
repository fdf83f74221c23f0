use crate::device::DeviceKey;

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::Serialize;

/// Lifecycle of the logical hardware session, independent of which
/// transport candidate carries it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        formatter.write_str(text)
    }
}

/// Snapshot published by the session after every step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub connected: bool,
    /// Key of the last identification record.
    pub device: Option<DeviceKey>,
    /// Name of the bound module, if the key is registered.
    pub module: Option<String>,
    /// `host:port` of the active transport.
    pub endpoint: Option<String>,
    pub mode: Option<i64>,
    pub generation: u64,
    pub candidates: usize,
    pub launch_active: bool,
}
