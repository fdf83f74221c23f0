use crate::BRIDGE_PORT;
use crate::config::LauncherConfig;
use crate::error::launch::LaunchError;
use crate::launcher::{BridgeLauncher, LaunchOutcome};

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, trace, warn};
use netstat2::{
    AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, SocketInfo, TcpState, get_sockets_info,
};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::runtime::Handle;

/// Launches the bridge as a local process.
///
/// 1. A process already listening on the bridge port wins.
/// 2. A configured `program_path` is spawned with the launch URL.
/// 3. Otherwise the launch URL goes to the OS URL opener.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program_path: Option<PathBuf>,
    port: u16,
}

impl ProcessLauncher {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            program_path: config.program_path.clone(),
            port: BRIDGE_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Spawn `program` with the launch URL and leave a task waiting on it.
    ///
    /// Needs the tokio runtime context, which `spawn_blocking` threads have.
    #[track_caller]
    fn spawn_program(&self, program: &Path, url: &str) -> Result<LaunchOutcome, LaunchError> {
        let Ok(runtime) = Handle::try_current() else {
            return Err(LaunchError::UnsupportedHost {
                message: "No async runtime to supervise the bridge program".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        debug!("Spawning bridge program {}", program.display());

        let mut command = TokioCommand::new(program);
        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => {
                let pid = child.id().unwrap_or_default();
                info!("Started bridge program {} (PID: {pid})", program.display());
                runtime.spawn(reap(child, program.display().to_string()));
                Ok(LaunchOutcome::Started { pid })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Bridge program not found at {}", program.display());
                Ok(LaunchOutcome::NotInstalled)
            }
            Err(e) => Err(LaunchError::Spawn {
                message: format!("Failed to spawn {}: {e}", program.display()),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            }),
        }
    }
}

/// Wait for the bridge program so it never lingers as a zombie.
async fn reap(mut child: TokioChild, program: String) {
    match child.wait().await {
        Ok(status) => debug!("Bridge program {program} exited ({status})"),
        Err(e) => warn!("Failed to wait for bridge program {program}: {e}"),
    }
}

impl BridgeLauncher for ProcessLauncher {
    fn launch(&self, url: &str) -> Result<LaunchOutcome, LaunchError> {
        match find_listener(self.port) {
            Ok(Some(pid)) => {
                info!("Bridge already listening on port {} (PID: {pid})", self.port);
                return Ok(LaunchOutcome::AlreadyRunning { pid });
            }
            Ok(None) => trace!("Nothing listening on port {}", self.port),
            Err(e) => warn!("Skipping running-bridge check: {e}"),
        }

        if let Some(program) = &self.program_path {
            return self.spawn_program(program, url);
        }

        open_url(url)
    }
}

fn quiet(command: &mut Command) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
}

#[track_caller]
fn query_tcp_sockets() -> Result<Vec<SocketInfo>, LaunchError> {
    get_sockets_info(
        AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
        ProtocolFlags::TCP,
    )
    .map_err(|e| LaunchError::NetworkQuery {
        message: format!("Failed to query network sockets: {e}"),
        location: ErrorLocation::from(Location::caller()),
        source: Box::new(e),
    })
}

/// PID of the process listening on `port`, if any.
#[track_caller]
pub(crate) fn find_listener(port: u16) -> Result<Option<u32>, LaunchError> {
    for s in query_tcp_sockets()? {
        if let ProtocolSocketInfo::Tcp(tcp) = s.protocol_socket_info
            && tcp.state == TcpState::Listen
            && tcp.local_port == port
            && let Some(&pid) = s.associated_pids.first()
        {
            if let Some(name) = process_name(pid) {
                debug!("Port {port} is held by {name} (PID: {pid})");
            }
            return Ok(Some(pid));
        }
    }

    Ok(None)
}

fn process_name(pid: u32) -> Option<String> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    sys.process(Pid::from_u32(pid))
        .map(|p| p.name().to_string_lossy().to_string())
}

#[cfg(target_os = "windows")]
const URL_OPENER: Option<(&str, &[&str])> = Some(("cmd", &["/C", "start", ""]));

#[cfg(target_os = "macos")]
const URL_OPENER: Option<(&str, &[&str])> = Some(("open", &[]));

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
const URL_OPENER: Option<(&str, &[&str])> = Some(("xdg-open", &[]));

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
)))]
const URL_OPENER: Option<(&str, &[&str])> = None;

#[track_caller]
fn open_url(url: &str) -> Result<LaunchOutcome, LaunchError> {
    let Some((opener, args)) = URL_OPENER else {
        return Err(LaunchError::UnsupportedHost {
            message: format!("No URL opener known for {}", std::env::consts::OS),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    debug!("Handing launch URL to {opener}");

    match quiet(Command::new(opener).args(args).arg(url)).status() {
        Ok(status) if status.success() => Ok(LaunchOutcome::Delegated),
        Ok(status) => {
            warn!("{opener} could not open the launch URL ({status})");
            Ok(LaunchOutcome::NotInstalled)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(LaunchError::UnsupportedHost {
            message: format!("URL opener {opener} is not available"),
            location: ErrorLocation::from(Location::caller()),
        }),
        Err(e) => Err(LaunchError::Spawn {
            message: format!("Failed to run {opener}: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        }),
    }
}
