use bridge_core::SessionId;
use bridge_core::config::LauncherConfig;
use bridge_core::error::launch::LaunchError;
use bridge_core::launcher::{BridgeLauncher, LaunchOutcome, ProcessLauncher, launch_url};

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::{Instant, sleep};

#[test]
fn given_session_id_when_building_launch_url_then_custom_scheme_with_room() {
    // GIVEN
    let session_id = SessionId::parse("0123abcd8f").unwrap();

    // WHEN/THEN
    assert_eq!(launch_url(&session_id), "entryhw://-roomId:0123abcd8f");
}

/// **VALUE**: A configured program path that does not exist reads as "not
/// installed", not as a failure.
///
/// **WHY THIS MATTERS**: The session turns `NotInstalled` into the install
/// prompt. An error here would only be logged and the user would get no
/// hint at all.
#[tokio::test]
async fn given_missing_program_when_launching_then_not_installed() {
    // GIVEN: A program path inside an empty dir, nothing listening on the bridge port
    let dir = TempDir::new().unwrap();
    let config = LauncherConfig {
        program_path: Some(dir.path().join("entry-hw")),
        relaunch_delay_ms: 1000,
    };
    let launcher = ProcessLauncher::new(&config).with_port(1);

    // WHEN
    let outcome = launcher.launch("entryhw://-roomId:0123abcd8f").unwrap();

    // THEN
    assert_eq!(outcome, LaunchOutcome::NotInstalled);
}

#[cfg(unix)]
#[tokio::test]
async fn given_existing_program_when_launching_then_started_with_pid() {
    // GIVEN: A program that exists everywhere on unix
    let launcher = ProcessLauncher::new(&sh_config()).with_port(1);

    // WHEN: Launching (sh treats the URL as a script path and exits)
    let outcome = launcher.launch("entryhw://-roomId:0123abcd8f").unwrap();

    // THEN
    assert!(matches!(outcome, LaunchOutcome::Started { pid } if pid > 0));
}

/// **VALUE**: A started bridge program is waited on after it exits.
///
/// **WHY THIS MATTERS**: Every launch request spawns a process. Without a
/// waiter each exited one stays in the process table until the host exits.
///
/// **BUG THIS CATCHES**: Would catch the child handle being dropped without
/// anything collecting its exit status.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn given_started_program_when_it_exits_then_reaped() {
    // GIVEN: A program that exits at once
    let launcher = ProcessLauncher::new(&sh_config()).with_port(1);
    let LaunchOutcome::Started { pid } = launcher.launch("entryhw://-roomId:0123abcd8f").unwrap()
    else {
        panic!("Expected the program to start");
    };

    // WHEN: Giving the runtime time to collect it
    let proc_entry = PathBuf::from(format!("/proc/{pid}"));
    let deadline = Instant::now() + Duration::from_secs(5);
    while proc_entry.exists() && Instant::now() < deadline {
        sleep(Duration::from_millis(20)).await;
    }

    // THEN: Gone from the process table, not left as a zombie
    assert!(!proc_entry.exists(), "PID {pid} was never reaped");
}

#[cfg(unix)]
#[test]
fn given_no_runtime_when_spawning_program_then_error_not_panic() {
    // GIVEN: A configured program but no tokio runtime on this thread
    let launcher = ProcessLauncher::new(&sh_config()).with_port(1);

    // WHEN
    let result = launcher.launch("entryhw://-roomId:0123abcd8f");

    // THEN
    assert!(matches!(result, Err(LaunchError::UnsupportedHost { .. })));
}

#[cfg(unix)]
fn sh_config() -> LauncherConfig {
    LauncherConfig {
        program_path: Some(PathBuf::from("/bin/sh")),
        relaunch_delay_ms: 1000,
    }
}
