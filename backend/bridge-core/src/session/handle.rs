use crate::config::BridgeConfig;
use crate::device::{DeviceRegistry, MonitorPanel};
use crate::error::session::SessionError;
use crate::identity::SessionId;
use crate::launcher::{BridgeLauncher, ProcessLauncher};
use crate::ports::{PortData, PortId, SendQueue};
use crate::session::SessionCore;
use crate::session::WorkspaceHook;
use crate::session::actor::{SessionActor, SessionCommand, session_actor};
use crate::session::events::{DownloadKind, SessionEvent};
use crate::session::state::SessionStatus;
use crate::transport::TransportPool;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use log::info;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc, oneshot};

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Assembles a session from its collaborators.
///
/// # Examples
///
/// ```no_run
/// use bridge_core::config::BridgeConfig;
/// use bridge_core::{SessionBuilder, SessionId};
///
/// #[tokio::main]
/// async fn main() {
///     let (session, mut events) =
///         SessionBuilder::new(BridgeConfig::default(), SessionId::generate()).spawn();
///
///     while let Some(event) = events.recv().await {
///         println!("{event:?}");
///     }
///     let _ = session.shutdown().await;
/// }
/// ```
pub struct SessionBuilder {
    config: BridgeConfig,
    session_id: SessionId,
    registry: DeviceRegistry,
    workspace: Option<Arc<dyn WorkspaceHook>>,
    panel: Option<Box<dyn MonitorPanel>>,
    launcher: Option<Arc<dyn BridgeLauncher>>,
}

impl SessionBuilder {
    pub fn new(config: BridgeConfig, session_id: SessionId) -> Self {
        Self {
            config,
            session_id,
            registry: DeviceRegistry::new(),
            workspace: None,
            panel: None,
            launcher: None,
        }
    }

    pub fn with_registry(mut self, registry: DeviceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn WorkspaceHook>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_monitor_panel(mut self, panel: Box<dyn MonitorPanel>) -> Self {
        self.panel = Some(panel);
        self
    }

    /// Defaults to a [`ProcessLauncher`] built from the launcher config.
    pub fn with_launcher(mut self, launcher: Arc<dyn BridgeLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Spawn the session actor. Must be called inside a tokio runtime.
    ///
    /// The pool opens immediately unless hardware is disabled.
    pub fn spawn(self) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (launch_tx, launch_rx) = mpsc::unbounded_channel();

        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(ProcessLauncher::new(&self.config.launcher)));
        let status = Arc::new(RwLock::new(SessionStatus::default()));

        let actor = SessionActor {
            core: SessionCore::new(self.registry, self.workspace, self.panel, events_tx),
            pool: TransportPool::new(&self.config, transport_tx),
            session_id: self.session_id.clone(),
            config: self.config,
            launcher,
            launch_tx,
            status: Arc::clone(&status),
            launch_active: false,
            reopen_at: None,
            probe: None,
        };

        tokio::spawn(session_actor(actor, command_rx, transport_rx, launch_rx));
        info!("Session actor spawned for room {}", self.session_id);

        let handle = SessionHandle {
            command_tx,
            status,
            session_id: self.session_id,
        };
        (handle, events_rx)
    }
}

/// Cloneable handle to a running session.
///
/// Every clone talks to the same actor. Calls fail with
/// [`SessionError::Closed`] once the session has shut down.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    status: Arc<RwLock<SessionStatus>>,
    session_id: SessionId,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Latest published status. Does not wait for the actor.
    pub async fn status(&self) -> SessionStatus {
        self.status.read().await.clone()
    }

    /// Stage a write; `port` leaves the readable set.
    pub async fn set_digital_out(
        &self,
        port: impl Into<PortId>,
        value: impl Into<Value>,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::SetDigitalOut {
            port: port.into(),
            value: value.into(),
        })
        .await
    }

    /// `0` while disconnected, `None` if the channel was never reported.
    pub async fn get_analog_in(&self, index: u32) -> Result<Option<Value>, SessionError> {
        self.request(|reply| SessionCommand::GetAnalogIn { index, reply })
            .await
    }

    /// `0` while disconnected; otherwise marks `port` readable.
    pub async fn get_digital_in(&self, port: impl Into<PortId>) -> Result<Value, SessionError> {
        let port = port.into();
        self.request(|reply| SessionCommand::GetDigitalIn { port, reply })
            .await
    }

    pub async fn mark_readable(&self, port: impl Into<PortId>) -> Result<(), SessionError> {
        self.send(SessionCommand::MarkReadable(port.into())).await
    }

    pub async fn unmark_readable(&self, port: impl Into<PortId>) -> Result<(), SessionError> {
        self.send(SessionCommand::UnmarkReadable(port.into())).await
    }

    pub async fn port_data(&self) -> Result<PortData, SessionError> {
        self.request(SessionCommand::PortData).await
    }

    pub async fn send_queue(&self) -> Result<SendQueue, SessionError> {
        self.request(SessionCommand::SendQueue).await
    }

    pub async fn set_zero(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::SetZero).await
    }

    pub async fn request_download(&self, kind: DownloadKind) -> Result<(), SessionError> {
        self.send(SessionCommand::RequestDownload(kind)).await
    }

    pub async fn ban_registered_modules(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::BanRegisteredModules).await
    }

    /// Start the bridge program and keep trying to reach it.
    pub async fn open_bridge_program(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::OpenBridgeProgram).await
    }

    pub async fn retry_connect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::RetryConnect).await
    }

    pub async fn close_connection(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::CloseConnection).await
    }

    /// Stop the actor and close every transport. Waits for the actor.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::Shutdown).await
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx.send(command).await.map_err(|e| SessionError::Closed {
            message: format!("Session actor stopped: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx.await.map_err(|e| SessionError::Closed {
            message: format!("Session actor dropped the reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
