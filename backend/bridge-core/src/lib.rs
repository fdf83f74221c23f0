pub mod config;
pub mod device;
pub mod error;
pub mod identity;
pub mod launcher;
pub mod ports;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use device::{
    Capabilities, DeviceKey, DeviceModule, DeviceRegistry, DisplayMode, HardwareContext,
    MonitorPanel, MonitorTemplate, MonitorView,
};
pub use identity::SessionId;
pub use ports::{PortData, PortId, SendQueue};
pub use session::{
    ConnectionState, DownloadKind, Notice, NoticeLevel, SessionBuilder, SessionEvent,
    SessionHandle, SessionStatus, WorkspaceHook,
};

pub const BRIDGE_PORT: u16 = 23518;
pub const BRIDGE_LOOPBACK_HOSTNAME: &str = "127.0.0.1";
pub const BRIDGE_LOOPBACK_URL: &str =
    const_format::concatcp!("http://", BRIDGE_LOOPBACK_HOSTNAME, ":", BRIDGE_PORT);
pub const BRIDGE_RELAY_PRIMARY_URL: &str =
    const_format::concatcp!("https://hardware.playentry.org:", BRIDGE_PORT);
pub const BRIDGE_RELAY_SECONDARY_URL: &str =
    const_format::concatcp!("https://hardware.play-entry.org:", BRIDGE_PORT);
pub const LEGACY_PROBE_URL: &str =
    const_format::concatcp!("wss://hardware.play-entry.org:", BRIDGE_PORT);
pub const BRIDGE_URL_SCHEME: &str = "entryhw";
