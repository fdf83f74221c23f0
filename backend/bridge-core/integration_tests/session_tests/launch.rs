use crate::session_tests::helpers::{
    ScriptedLauncher, UNREACHABLE_URL, calls, test_config, wait_for_event, wait_for_status,
};

use bridge_core::error::launch::LaunchError;
use bridge_core::launcher::LaunchOutcome;
use bridge_core::{NoticeLevel, SessionBuilder, SessionEvent, SessionId};

use common::ErrorLocation;

use std::sync::Arc;

/// **VALUE**: When nothing can start the bridge, the host is asked to offer
/// the installer.
///
/// **WHY THIS MATTERS**: The usual first-run failure is a missing bridge
/// program. Without the prompt the user only sees a session that never
/// connects.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The launch report being dropped instead of routed back to the actor
/// - The launcher receiving a URL without the room id
#[tokio::test]
async fn given_bridge_not_installed_when_launching_then_install_prompt_requested() {
    // GIVEN: A launcher that finds nothing to start
    let launcher = Arc::new(ScriptedLauncher::new(|| Ok(LaunchOutcome::NotInstalled)));
    let session_id = SessionId::generate();
    let (session, mut events) = SessionBuilder::new(test_config(UNREACHABLE_URL), session_id.clone())
        .with_launcher(launcher.clone())
        .spawn();

    // WHEN: The host starts the launch flow
    session.open_bridge_program().await.unwrap();

    // THEN: Install prompt, launch flag set, URL carried the room
    wait_for_event(&mut events, |e| *e == SessionEvent::InstallPromptRequested).await;
    let status = wait_for_status(&session, |s| s.launch_active).await;
    assert!(status.launch_active);
    assert_eq!(calls(&launcher.urls), vec![format!("entryhw://-roomId:{session_id}")]);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_unsupported_host_when_launching_then_error_notice() {
    // GIVEN: A launcher that cannot run here
    let launcher = Arc::new(ScriptedLauncher::new(|| {
        Err(LaunchError::UnsupportedHost {
            message: "no opener".to_string(),
            location: ErrorLocation::here(),
        })
    }));
    let (session, mut events) = SessionBuilder::new(test_config(UNREACHABLE_URL), SessionId::generate())
        .with_launcher(launcher)
        .spawn();

    // WHEN
    session.open_bridge_program().await.unwrap();

    // THEN
    let event = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Notice(_))).await;
    let SessionEvent::Notice(notice) = event else {
        unreachable!()
    };
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.body, "no opener");

    session.shutdown().await.unwrap();
}

/// **VALUE**: Launching while disconnected redials after the relaunch delay.
///
/// **BUG THIS CATCHES**: Would catch the scheduled reopen never firing, so a
/// freshly started bridge is only found if the user clicks retry.
#[tokio::test]
async fn given_no_live_transport_when_launching_then_pool_reopened_after_delay() {
    // GIVEN: A session whose first generation found nothing
    let launcher = Arc::new(ScriptedLauncher::new(|| Ok(LaunchOutcome::Delegated)));
    let (session, _events) = SessionBuilder::new(test_config(UNREACHABLE_URL), SessionId::generate())
        .with_launcher(launcher)
        .spawn();
    wait_for_status(&session, |s| s.generation == 1).await;

    // WHEN: Launching
    session.open_bridge_program().await.unwrap();

    // THEN: A second generation is dialled
    let status = wait_for_status(&session, |s| s.generation >= 2).await;
    assert!(status.launch_active);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_launch_flow_active_when_retrying_then_new_generation_and_flag_cleared() {
    // GIVEN: The launch flow was used
    let launcher = Arc::new(ScriptedLauncher::new(|| Ok(LaunchOutcome::Delegated)));
    let (session, _events) = SessionBuilder::new(test_config(UNREACHABLE_URL), SessionId::generate())
        .with_launcher(launcher)
        .spawn();
    session.open_bridge_program().await.unwrap();
    let launched = wait_for_status(&session, |s| s.launch_active).await;

    // WHEN: Retrying
    session.retry_connect().await.unwrap();

    // THEN
    let status = wait_for_status(&session, |s| {
        !s.launch_active && s.generation > launched.generation
    })
    .await;
    assert!(status.candidates <= 2);

    session.shutdown().await.unwrap();
}
