//! Test helpers for session integration tests.
//!
//! This module provides:
//! - A fake bridge that speaks the bridge's socket protocol on loopback
//! - A scripted launcher and a trivial device module
//! - Polling helpers for status and events

use bridge_core::config::BridgeConfig;
use bridge_core::error::launch::LaunchError;
use bridge_core::launcher::{BridgeLauncher, LaunchOutcome};
use bridge_core::transport::OutboundMessage;
use bridge_core::transport::wire::{self, Packet};
use bridge_core::{
    DeviceModule, DeviceRegistry, MonitorPanel, MonitorView, PortData, SendQueue, SessionBuilder,
    SessionEvent, SessionHandle, SessionId, SessionStatus, WorkspaceHook,
};

use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Nothing listens on port 1, so dialling it fails immediately.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";

const OPEN_FRAME: &str = r#"0{"sid":"test","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#;

// ============================================
// FAKE BRIDGE
// ============================================

/// Accepts websocket clients on an ephemeral loopback port and completes the
/// namespace handshake for each of them.
pub struct FakeBridge {
    pub port: u16,
    connections: mpsc::UnboundedReceiver<BridgeConnection>,
    task: JoinHandle<()>,
}

impl FakeBridge {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake bridge");
        let port = listener.local_addr().expect("No local address").port();
        let (tx, connections) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut path = String::new();
                let callback = |request: &Request, response: Response| {
                    path = request.uri().to_string();
                    Ok::<Response, ErrorResponse>(response)
                };
                let Ok(ws) = accept_hdr_async(stream, callback).await else {
                    continue;
                };

                let mut connection = BridgeConnection { ws, path };
                if !connection.handshake().await {
                    continue;
                }
                if tx.send(connection).is_err() {
                    break;
                }
            }
        });

        Self {
            port,
            connections,
            task,
        }
    }

    /// `http://127.0.0.1:<port>`, the form the loopback URL is configured in.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    pub async fn next_connection(&mut self) -> BridgeConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("No client connected to the fake bridge")
            .expect("Fake bridge stopped")
    }

    /// A connection arriving within `wait`, if any.
    pub async fn try_next_connection(&mut self, wait: Duration) -> Option<BridgeConnection> {
        timeout(wait, self.connections.recv()).await.ok().flatten()
    }
}

impl Drop for FakeBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Server side of one client connection.
pub struct BridgeConnection {
    ws: WebSocketStream<TcpStream>,
    /// Request path and query the client dialled.
    pub path: String,
}

impl BridgeConnection {
    /// Open plus namespace connect. `false` if the client already left.
    async fn handshake(&mut self) -> bool {
        for frame in [OPEN_FRAME, "40"] {
            if self.ws.send(Message::Text(frame.into())).await.is_err() {
                return false;
            }
        }
        true
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .expect("Failed to send frame to client");
    }

    pub async fn send_mode(&mut self, mode: i64) {
        let frame = wire::encode_event(wire::MODE_EVENT, &mode).expect("Failed to encode mode");
        self.send_text(&frame).await;
    }

    /// Send a `message` event whose `data` is `data`.
    pub async fn send_data(&mut self, data: Value) {
        let frame = wire::encode_event(wire::MESSAGE_EVENT, &json!({ "data": data }))
            .expect("Failed to encode message");
        self.send_text(&frame).await;
    }

    /// Send an identification or status record the way the bridge does:
    /// as JSON text inside `data`.
    pub async fn send_record(&mut self, record: Value) {
        self.send_data(Value::String(record.to_string())).await;
    }

    /// Read outbound messages until one satisfies `predicate`.
    pub async fn wait_for_message(
        &mut self,
        predicate: impl Fn(&OutboundMessage) -> bool,
    ) -> OutboundMessage {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = timeout(remaining, self.ws.next())
                .await
                .expect("Timed out waiting for an outbound message")
                .expect("Client closed the connection")
                .expect("Failed to read frame");

            let Message::Text(text) = frame else {
                continue;
            };
            if let Ok(Packet::Event { name, data }) = wire::decode(text.as_str())
                && name == wire::MESSAGE_EVENT
            {
                let message: OutboundMessage =
                    serde_json::from_value(data).expect("Outbound message has the wrong shape");
                if predicate(&message) {
                    return message;
                }
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

// ============================================
// SESSION SETUP
// ============================================

/// Config pointing the loopback candidate at `loopback`, with one dead relay
/// and short timings.
pub fn test_config(loopback: &str) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.tick_interval_ms = 20;
    config.transport.loopback_url = loopback.to_string();
    config.transport.relay_urls = vec![UNREACHABLE_URL.to_string()];
    config.transport.legacy_probe_url = "ws://127.0.0.1:1".to_string();
    config.transport.reconnection_delay_ms = 20;
    config.transport.reconnection_delay_max_ms = 50;
    config.transport.timeout_ms = 500;
    config.launcher.relaunch_delay_ms = 50;
    config
}

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Returns whatever the test scripted, recording each launch URL.
pub struct ScriptedLauncher {
    outcome: Box<dyn Fn() -> Result<LaunchOutcome, LaunchError> + Send + Sync>,
    pub urls: CallLog,
}

impl ScriptedLauncher {
    pub fn new(
        outcome: impl Fn() -> Result<LaunchOutcome, LaunchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            outcome: Box::new(outcome),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl BridgeLauncher for ScriptedLauncher {
    fn launch(&self, url: &str) -> Result<LaunchOutcome, LaunchError> {
        self.urls.lock().unwrap().push(url.to_string());
        (self.outcome)()
    }
}

pub struct TestModule;

impl DeviceModule for TestModule {
    fn name(&self) -> &str {
        "test_board"
    }
}

pub struct RecordingWorkspace {
    pub log: CallLog,
}

impl WorkspaceHook for RecordingWorkspace {
    fn refresh_hardware_menu(&self) {
        self.log.lock().unwrap().push("refresh".to_string());
    }

    fn ban_block_class(&self, class_name: &str) {
        self.log.lock().unwrap().push(format!("ban:{class_name}"));
    }
}

/// A property panel that may move between threads but not be shared.
pub struct SendOnlyPanel {
    log: CallLog,
    selected: Cell<bool>,
}

impl SendOnlyPanel {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            selected: Cell::new(false),
        }
    }

    fn record(&self, call: &str) {
        self.log.lock().unwrap().push(call.to_string());
    }
}

impl MonitorPanel for SendOnlyPanel {
    fn create_view(&mut self, module: Arc<dyn DeviceModule>) -> Box<dyn MonitorView> {
        self.record(&format!("create_view:{}", module.name()));
        Box::new(NullView)
    }

    fn add_mode(&mut self) {
        self.selected.set(true);
        self.record("add_mode");
    }

    fn remove_mode(&mut self) {
        self.selected.set(false);
        self.record("remove_mode");
    }

    fn is_selected(&self) -> bool {
        self.selected.get()
    }
}

struct NullView;

impl MonitorView for NullView {
    fn rebind(&mut self, _module: Arc<dyn DeviceModule>) {}
    fn init_view(&mut self) {}
    fn generate_list_view(&mut self) {}
    fn generate_view(&mut self) {}
    fn update(&mut self, _port_data: &PortData, _send_queue: &SendQueue) {}
}

pub fn test_registry() -> DeviceRegistry {
    DeviceRegistry::new().with_module("a.1", Arc::new(TestModule) as Arc<dyn DeviceModule>)
}

/// A session for `config` using a launcher that reports `NotInstalled`.
pub fn spawn_session(
    config: BridgeConfig,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    SessionBuilder::new(config, SessionId::generate())
        .with_registry(test_registry())
        .with_launcher(Arc::new(ScriptedLauncher::new(|| {
            Ok(LaunchOutcome::NotInstalled)
        })))
        .spawn()
}

// ============================================
// WAITING
// ============================================

/// Poll the published status until `predicate` holds.
pub async fn wait_for_status(
    session: &SessionHandle,
    predicate: impl Fn(&SessionStatus) -> bool,
) -> SessionStatus {
    let deadline = Instant::now() + WAIT;
    loop {
        let status = session.status().await;
        if predicate(&status) {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for status, last: {status:?}"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// Receive events until one satisfies `predicate`.
pub async fn wait_for_event(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = timeout(remaining, events.recv())
            .await
            .expect("Timed out waiting for a session event")
            .expect("Session event channel closed");
        if predicate(&event) {
            return event;
        }
    }
}
