use crate::session_tests::helpers::{
    CallLog, FakeBridge, RecordingWorkspace, ScriptedLauncher, SendOnlyPanel, UNREACHABLE_URL,
    calls, spawn_session, test_config, test_registry, wait_for_event, wait_for_status,
};

use bridge_core::error::session::SessionError;
use bridge_core::launcher::LaunchOutcome;
use bridge_core::{
    ConnectionState, DeviceKey, DownloadKind, NoticeLevel, PortId, SessionBuilder, SessionEvent,
    SessionId,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

/// **VALUE**: A session reaches a running bridge on loopback and joins its
/// own room.
///
/// **WHY THIS MATTERS**: The bridge pairs clients by the `roomId` query
/// parameter. Connecting without it, or to the wrong socket path, leaves the
/// board unreachable even though the socket is up.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The endpoint URL losing the socket path or the Engine.IO query
/// - The session id not being passed as the room
/// - Connected never being published after the namespace handshake
#[tokio::test]
async fn given_running_bridge_when_session_spawned_then_connected_in_own_room() {
    // GIVEN: A fake bridge on loopback
    let mut bridge = FakeBridge::start().await;
    let session_id = SessionId::generate();

    // WHEN: Spawning a session pointed at it
    let (session, _events) = SessionBuilder::new(test_config(&bridge.base_url()), session_id.clone())
        .with_registry(test_registry())
        .with_launcher(Arc::new(ScriptedLauncher::new(|| Ok(LaunchOutcome::Delegated))))
        .spawn();
    let connection = bridge.next_connection().await;

    // THEN: Connected through the loopback candidate, in our room
    let status = wait_for_status(&session, |s| s.connected).await;
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.endpoint, Some(format!("127.0.0.1:{}", bridge.port)));
    assert!(connection.path.starts_with("/socket.io/?EIO=3&transport=websocket"));
    assert!(
        connection.path.contains(&format!("roomId={session_id}")),
        "Path was {}",
        connection.path
    );

    session.shutdown().await.unwrap();
}

/// **VALUE**: An identification record binds the registered module and the
/// readings become visible through the handle.
///
/// **BUG THIS CATCHES**: Would catch records from the wire not reaching the
/// resolver (e.g. `data` arriving as JSON text rather than an object).
#[tokio::test]
async fn given_connected_session_when_identification_record_sent_then_device_bound() {
    // GIVEN: A connected session
    let mut bridge = FakeBridge::start().await;
    let (session, mut events) = spawn_session(test_config(&bridge.base_url()));
    let mut connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;

    // WHEN: The board identifies itself with a reading
    connection.send_mode(0).await;
    connection
        .send_record(json!({"company": 10, "model": 1, "a0": 512}))
        .await;

    // THEN: Bound, and the reading is available
    let status = wait_for_status(&session, |s| s.module.is_some()).await;
    assert_eq!(status.device, Some(DeviceKey::new(10, 1)));
    assert_eq!(status.module.as_deref(), Some("test_board"));
    assert_eq!(status.mode, Some(0));
    assert_eq!(session.get_analog_in(0).await.unwrap(), Some(json!(512)));
    wait_for_event(&mut events, |e| *e == SessionEvent::SessionChanged).await;

    session.shutdown().await.unwrap();
}

/// **VALUE**: The update pump carries staged writes and read interest to the
/// bridge on every tick.
///
/// **WHY THIS MATTERS**: This is the only way outputs reach the board. The
/// bridge reconfigures pins from `readablePorts`, so both halves of the queue
/// must arrive together.
#[tokio::test]
async fn given_staged_output_and_read_interest_when_pump_ticks_then_bridge_receives_both() {
    // GIVEN: A connected session with a status record for pin 4
    let mut bridge = FakeBridge::start().await;
    let (session, _events) = spawn_session(test_config(&bridge.base_url()));
    let mut connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;
    connection.send_record(json!({"4": 1})).await;

    // WHEN: Writing pin 13 and reading pin 4
    session.set_digital_out(13u32, 1).await.unwrap();
    let reading = loop {
        let value = session.get_digital_in(4u32).await.unwrap();
        if value == json!(1) {
            break value;
        }
        sleep(Duration::from_millis(10)).await;
    };

    // THEN: A tick carries both
    let message = connection
        .wait_for_message(|m| {
            m.decode_queue()
                .map(|q| !q.readable_ports().is_empty() && q.get(&PortId::from(13u32)).is_some())
                .unwrap_or(false)
        })
        .await;
    let queue = message.decode_queue().unwrap();
    assert_eq!(reading, json!(1));
    assert_eq!(queue.get(&PortId::from(13u32)), Some(&json!(1)));
    assert_eq!(queue.readable_ports(), &[PortId::from(4u32)]);
    assert_eq!(message.encoding, "utf8");

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_connected_session_when_disconnect_directive_sent_then_terminated_notice() {
    // GIVEN: A bound device
    let mut bridge = FakeBridge::start().await;
    let (session, mut events) = spawn_session(test_config(&bridge.base_url()));
    let mut connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;
    connection
        .send_record(json!({"company": 10, "model": 1}))
        .await;
    wait_for_status(&session, |s| s.module.is_some()).await;

    // WHEN: The bridge tells us to disconnect
    connection.send_data(json!("disconnectHardware")).await;

    // THEN: Logical session over, device unbound, error notice raised
    let status = wait_for_status(&session, |s| s.state == ConnectionState::Disconnected).await;
    assert!(status.device.is_none());
    assert!(status.module.is_none());
    let notice = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::Notice(n) if n.level == NoticeLevel::Error)
    })
    .await;
    let SessionEvent::Notice(notice) = notice else {
        unreachable!()
    };
    assert_eq!(notice.title, "Hardware disconnected");

    session.shutdown().await.unwrap();
}

/// **VALUE**: After a disconnect directive the bridge can announce the next
/// board on the same socket and the session binds it.
///
/// **WHY THIS MATTERS**: Swapping boards sends the directive and then a new
/// identification record without reconnecting. A session that ignores data
/// once disconnected stays dead until the socket drops.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Inbound records being dropped while Disconnected
/// - The pump writing to the bridge while the session is Disconnected
#[tokio::test]
async fn given_disconnect_directive_when_bridge_announces_device_again_then_rebound() {
    // GIVEN: A device that was bound, then disconnected by the bridge
    let mut bridge = FakeBridge::start().await;
    let (session, _events) = spawn_session(test_config(&bridge.base_url()));
    let mut connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;
    connection
        .send_record(json!({"company": 10, "model": 1}))
        .await;
    wait_for_status(&session, |s| s.module.is_some()).await;
    connection.send_data(json!("disconnectHardware")).await;
    wait_for_status(&session, |s| s.state == ConnectionState::Disconnected).await;

    // WHEN: The bridge announces the board again with a reading
    connection
        .send_record(json!({"company": 10, "model": 1, "a0": 512}))
        .await;

    // THEN: Connected and bound again on the same transport
    let status = wait_for_status(&session, |s| s.connected && s.module.is_some()).await;
    assert_eq!(status.module.as_deref(), Some("test_board"));
    assert_eq!(status.generation, 1);
    assert_eq!(session.get_analog_in(0).await.unwrap(), Some(json!(512)));

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_command_mode_when_bridge_switches_to_raw_then_session_disconnected() {
    // GIVEN: Command mode
    let mut bridge = FakeBridge::start().await;
    let (session, _events) = spawn_session(test_config(&bridge.base_url()));
    let mut connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;
    connection.send_mode(0).await;
    wait_for_status(&session, |s| s.mode == Some(0)).await;

    // WHEN: Raw mode
    connection.send_mode(1).await;

    // THEN
    let status = wait_for_status(&session, |s| s.mode == Some(1)).await;
    assert_eq!(status.state, ConnectionState::Disconnected);

    session.shutdown().await.unwrap();
}

/// **VALUE**: A dropped bridge connection triggers a fresh pool generation
/// that reconnects on its own.
///
/// **WHY THIS MATTERS**: Bridges restart (firmware upload, board swap). The
/// session must come back without the host doing anything.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Disconnected events being ignored, leaving the session stuck
/// - The reopen stacking candidates instead of replacing them
#[tokio::test]
async fn given_connected_session_when_bridge_drops_then_new_generation_reconnects() {
    // GIVEN: A connected session
    let mut bridge = FakeBridge::start().await;
    let (session, _events) = spawn_session(test_config(&bridge.base_url()));
    let connection = bridge.next_connection().await;
    let first = wait_for_status(&session, |s| s.connected).await;

    // WHEN: The bridge closes the socket
    connection.close().await;

    // THEN: A newer generation connects again without stacking candidates
    let _second_connection = bridge.next_connection().await;
    let status = wait_for_status(&session, |s| s.connected && s.generation > first.generation).await;
    assert!((1..=2).contains(&status.candidates), "{status:?}");

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_disabled_hardware_when_session_spawned_then_nothing_dialled() {
    // GIVEN: Hardware disabled, a bridge that would accept
    let mut bridge = FakeBridge::start().await;
    let mut config = test_config(&bridge.base_url());
    config.disable_hardware = true;
    let launcher = Arc::new(ScriptedLauncher::new(|| Ok(LaunchOutcome::Delegated)));
    let (session, _events) = SessionBuilder::new(config, SessionId::generate())
        .with_launcher(launcher.clone())
        .spawn();

    // WHEN: The host asks to launch and retry anyway
    session.open_bridge_program().await.unwrap();
    session.retry_connect().await.unwrap();

    // THEN: No connection, no launch, no pool
    assert!(bridge.try_next_connection(Duration::from_millis(300)).await.is_none());
    let status = session.status().await;
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.generation, 0);
    assert_eq!(status.candidates, 0);
    assert!(calls(&launcher.urls).is_empty());

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_unreachable_bridge_when_all_candidates_give_up_then_disconnected() {
    // GIVEN/WHEN: Every candidate points at a dead port
    let (session, _events) = spawn_session(test_config(UNREACHABLE_URL));

    // THEN: The pool runs dry and the session settles as disconnected
    let status = wait_for_status(&session, |s| {
        s.generation == 1 && s.candidates == 0 && s.state == ConnectionState::Disconnected
    })
    .await;
    assert!(!status.connected);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_connected_session_when_connection_closed_then_pool_emptied() {
    // GIVEN: A connected session
    let mut bridge = FakeBridge::start().await;
    let (session, mut events) = spawn_session(test_config(&bridge.base_url()));
    let _connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;

    // WHEN
    session.close_connection().await.unwrap();

    // THEN
    let status = wait_for_status(&session, |s| !s.connected).await;
    assert_eq!(status.candidates, 0);
    assert_eq!(status.endpoint, None);
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Notice(_))).await;

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_host_requests_when_forwarded_then_events_and_workspace_calls_follow() {
    // GIVEN: A session with a workspace
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (session, mut events) = SessionBuilder::new(test_config(UNREACHABLE_URL), SessionId::generate())
        .with_registry(test_registry())
        .with_workspace(Arc::new(RecordingWorkspace {
            log: Arc::clone(&log),
        }))
        .spawn();

    // WHEN: Asking for a download and banning module blocks
    session.request_download(DownloadKind::Manual).await.unwrap();
    session.ban_registered_modules().await.unwrap();

    // THEN
    wait_for_event(&mut events, |e| {
        *e == SessionEvent::DownloadRequested(DownloadKind::Manual)
    })
    .await;
    session.port_data().await.unwrap();
    assert_eq!(calls(&log), vec!["ban:test_board"]);

    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_legacy_bridge_answering_when_session_spawned_then_update_warning() {
    // GIVEN: Something answering websockets at the legacy address
    let legacy = FakeBridge::start().await;
    let mut config = test_config(UNREACHABLE_URL);
    config.transport.legacy_probe_url = legacy.ws_url();

    // WHEN
    let (session, mut events) = spawn_session(config);

    // THEN
    let event = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Notice(_))).await;
    let SessionEvent::Notice(notice) = event else {
        unreachable!()
    };
    assert_eq!(notice.level, NoticeLevel::Warning);

    session.shutdown().await.unwrap();
}

/// **VALUE**: Host panels only need to be `Send`; every bind is announced.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The actor task requiring `Sync` host objects
/// - The connected notice depending on a monitor template
#[tokio::test]
async fn given_send_only_panel_when_device_bound_then_connected_notice() {
    // GIVEN: A session with a panel that is not Sync
    let mut bridge = FakeBridge::start().await;
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (session, mut events) = SessionBuilder::new(test_config(&bridge.base_url()), SessionId::generate())
        .with_registry(test_registry())
        .with_monitor_panel(Box::new(SendOnlyPanel::new(Arc::clone(&log))))
        .with_launcher(Arc::new(ScriptedLauncher::new(|| Ok(LaunchOutcome::Delegated))))
        .spawn();
    let mut connection = bridge.next_connection().await;
    wait_for_status(&session, |s| s.connected).await;

    // WHEN: A board without a monitor template identifies itself
    connection
        .send_record(json!({"company": 10, "model": 1}))
        .await;

    // THEN: Success notice with the plain body, monitor untouched
    let event = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Notice(_))).await;
    let SessionEvent::Notice(notice) = event else {
        unreachable!()
    };
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.body, "test_board is connected.");
    assert!(calls(&log).is_empty());

    session.shutdown().await.unwrap();
}

/// **VALUE**: A shut-down session reports a typed error instead of hanging.
///
/// **BUG THIS CATCHES**: Would catch handle calls awaiting a reply forever
/// after the actor exited.
#[tokio::test]
async fn given_shut_down_session_when_handle_used_then_closed_error() {
    // GIVEN: A session that was shut down
    let (session, _events) = spawn_session(test_config(UNREACHABLE_URL));
    let clone = session.clone();
    session.shutdown().await.unwrap();

    // WHEN: Using another handle
    let result = clone.port_data().await;

    // THEN
    assert!(matches!(result, Err(SessionError::Closed { .. })));
}
