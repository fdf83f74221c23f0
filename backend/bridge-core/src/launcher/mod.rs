//! Starting the bridge program on this machine.
//!
//! The bridge registers a custom URL scheme at install time. Launching it
//! means handing `entryhw://-roomId:<session id>` to either a configured
//! program or the OS URL opener, so the started bridge joins our room.

mod process;

pub use process::ProcessLauncher;

use crate::BRIDGE_URL_SCHEME;
use crate::error::launch::LaunchError;
use crate::identity::SessionId;

/// Result of one launch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A process already listens on the bridge port.
    AlreadyRunning { pid: u32 },
    /// The configured program was started.
    Started { pid: u32 },
    /// The URL was handed to the OS opener.
    Delegated,
    /// Nothing could handle the URL: the bridge is probably not installed.
    NotInstalled,
}

/// Starts the bridge program. Runs on a blocking thread.
pub trait BridgeLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<LaunchOutcome, LaunchError>;
}

/// `entryhw://-roomId:<session id>`
pub fn launch_url(session_id: &SessionId) -> String {
    format!("{BRIDGE_URL_SCHEME}://-roomId:{session_id}")
}
