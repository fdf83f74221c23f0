use crate::config::BridgeConfig;
use crate::error::launch::LaunchError;
use crate::identity::SessionId;
use crate::launcher::{BridgeLauncher, LaunchOutcome, launch_url};
use crate::ports::{PortData, PortId, SendQueue};
use crate::session::SessionCore;
use crate::session::events::{DownloadKind, Notice, SessionEvent};
use crate::session::state::SessionStatus;
use crate::transport::{
    TransportEvent, TransportEventKind, TransportPool, probe_legacy_bridge,
};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use serde_json::Value;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};

/// Commands that reach the session actor.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    SetDigitalOut { port: PortId, value: Value },
    GetAnalogIn { index: u32, reply: oneshot::Sender<Option<Value>> },
    GetDigitalIn { port: PortId, reply: oneshot::Sender<Value> },
    MarkReadable(PortId),
    UnmarkReadable(PortId),
    PortData(oneshot::Sender<PortData>),
    SendQueue(oneshot::Sender<SendQueue>),
    SetZero,
    RequestDownload(DownloadKind),
    BanRegisteredModules,
    OpenBridgeProgram,
    RetryConnect,
    CloseConnection,
    Shutdown(oneshot::Sender<()>),
}

enum Flow {
    Continue,
    Stop,
}

/// Everything the actor owns besides its channels.
pub(crate) struct SessionActor {
    pub(crate) core: SessionCore,
    pub(crate) pool: TransportPool,
    pub(crate) session_id: SessionId,
    pub(crate) config: BridgeConfig,
    pub(crate) launcher: Arc<dyn BridgeLauncher>,
    pub(crate) launch_tx: mpsc::UnboundedSender<Result<LaunchOutcome, LaunchError>>,
    pub(crate) status: Arc<RwLock<SessionStatus>>,
    pub(crate) launch_active: bool,
    pub(crate) reopen_at: Option<Instant>,
    pub(crate) probe: Option<JoinHandle<()>>,
}

/// The session actor task.
///
/// Runs until a `Shutdown` command arrives or every handle is dropped.
pub(crate) async fn session_actor(
    mut actor: SessionActor,
    mut command_rx: mpsc::Receiver<SessionCommand>,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    mut launch_rx: mpsc::UnboundedReceiver<Result<LaunchOutcome, LaunchError>>,
) {
    info!("Session actor started for room {}", actor.session_id);

    let mut tick = interval(actor.config.tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if actor.config.disable_hardware {
        info!("Hardware features disabled; no transport will be opened");
    } else {
        actor.reopen();
    }
    let snapshot = actor.snapshot();
    publish_status(&actor.status, snapshot).await;

    loop {
        let reopen_at = actor.reopen_at;
        let reopen_timer = async move {
            match reopen_at {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let flow = tokio::select! {
            biased;

            Some(event) = transport_rx.recv() => {
                actor.on_transport_event(event);
                Flow::Continue
            }
            command = command_rx.recv() => match command {
                Some(command) => actor.on_command(command),
                None => {
                    debug!("All session handles dropped");
                    Flow::Stop
                }
            },
            Some(report) = launch_rx.recv() => {
                actor.on_launch_report(report);
                Flow::Continue
            }
            _ = reopen_timer => {
                actor.reopen();
                Flow::Continue
            }
            _ = tick.tick() => {
                actor.core.tick(&mut actor.pool.sink());
                Flow::Continue
            }
        };

        let snapshot = actor.snapshot();
        publish_status(&actor.status, snapshot).await;

        if let Flow::Stop = flow {
            break;
        }
    }

    actor.stop();
    let snapshot = actor.snapshot();
    publish_status(&actor.status, snapshot).await;
    info!("Session actor stopped");
}

impl SessionActor {
    /// Tear down the pool and dial a new generation.
    pub(crate) fn reopen(&mut self) {
        self.reopen_at = None;

        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
        if !self.launch_active {
            self.spawn_legacy_probe();
        }

        self.pool.open_all(&self.session_id);
        self.core.on_pool_reopen();
    }

    fn spawn_legacy_probe(&mut self) {
        let url = self.config.transport.legacy_probe_url.clone();
        let budget = self.pool.policy().timeout;
        let events = self.core.event_sender();

        self.probe = Some(tokio::spawn(async move {
            if probe_legacy_bridge(&url, budget).await {
                let _ = events.send(SessionEvent::Notice(Notice::legacy_bridge()));
            }
        }));
    }

    pub(crate) fn on_transport_event(&mut self, event: TransportEvent) {
        let id = event.source;
        if !self.pool.is_current(id) {
            trace!("Dropping event from stale candidate {id}");
            return;
        }

        match event.kind {
            TransportEventKind::Connected => {
                if self.pool.promote(id) {
                    self.pool.reset_attempts(id);
                    self.core.on_transport_connected();
                } else {
                    debug!("Candidate {id} connected as standby");
                }
            }
            TransportEventKind::Mode(mode) => {
                if self.pool.is_active(id) {
                    self.core.on_mode(mode);
                }
            }
            TransportEventKind::Message(message) => {
                if self.pool.is_active(id) {
                    self.core.on_message(&message);
                } else {
                    trace!("Ignoring data from standby candidate {id}");
                }
            }
            TransportEventKind::Disconnected => {
                if self.pool.is_active(id) {
                    info!("Candidate {id} dropped; reopening transport pool");
                    self.reopen();
                } else {
                    debug!("Standby candidate {id} dropped");
                }
            }
            TransportEventKind::GaveUp => {
                if self.pool.retire(id) && self.pool.active().is_none() {
                    self.core.on_pool_exhausted();
                }
            }
        }
    }

    fn on_command(&mut self, command: SessionCommand) -> Flow {
        match command {
            SessionCommand::SetDigitalOut { port, value } => self.core.set_digital_out(port, value),
            SessionCommand::GetAnalogIn { index, reply } => {
                let _ = reply.send(self.core.get_analog_in(index));
            }
            SessionCommand::GetDigitalIn { port, reply } => {
                let _ = reply.send(self.core.get_digital_in(port));
            }
            SessionCommand::MarkReadable(port) => self.core.mark_readable(port),
            SessionCommand::UnmarkReadable(port) => self.core.unmark_readable(&port),
            SessionCommand::PortData(reply) => {
                let _ = reply.send(self.core.port_data().clone());
            }
            SessionCommand::SendQueue(reply) => {
                let _ = reply.send(self.core.send_queue().clone());
            }
            SessionCommand::SetZero => self.core.set_zero(&mut self.pool.sink()),
            SessionCommand::RequestDownload(kind) => {
                self.core.emit(SessionEvent::DownloadRequested(kind));
            }
            SessionCommand::BanRegisteredModules => self.core.ban_registered_modules(),
            SessionCommand::OpenBridgeProgram => self.open_bridge_program(),
            SessionCommand::RetryConnect => self.retry_connect(),
            SessionCommand::CloseConnection => self.close_connection(),
            SessionCommand::Shutdown(reply) => {
                self.stop();
                let _ = reply.send(());
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn open_bridge_program(&mut self) {
        if self.config.disable_hardware {
            debug!("Hardware disabled; ignoring launch request");
            return;
        }

        self.launch_active = true;
        self.pool.raise_attempt_limit();

        let launcher = Arc::clone(&self.launcher);
        let url = launch_url(&self.session_id);
        let report_tx = self.launch_tx.clone();
        tokio::spawn(async move {
            let report = match tokio::task::spawn_blocking(move || launcher.launch(&url)).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("Launcher task failed: {e}");
                    return;
                }
            };
            let _ = report_tx.send(report);
        });

        if !self.pool.has_live_transport() {
            let delay = self.config.relaunch_delay();
            debug!("Reopening transport pool in {delay:?}");
            self.schedule_reopen(delay);
        }
    }

    fn retry_connect(&mut self) {
        if self.config.disable_hardware {
            debug!("Hardware disabled; ignoring retry request");
            return;
        }

        self.launch_active = false;
        self.pool.raise_attempt_limit();
        self.reopen();
    }

    fn close_connection(&mut self) {
        self.reopen_at = None;
        self.pool.close_all();
        self.core.disconnect_hardware();
    }

    fn schedule_reopen(&mut self, delay: Duration) {
        self.reopen_at = Some(Instant::now() + delay);
    }

    pub(crate) fn on_launch_report(&mut self, report: Result<LaunchOutcome, LaunchError>) {
        match report {
            Ok(LaunchOutcome::AlreadyRunning { pid }) => {
                debug!("Bridge program already running (PID: {pid})");
            }
            Ok(LaunchOutcome::Started { pid }) => debug!("Bridge program started (PID: {pid})"),
            Ok(LaunchOutcome::Delegated) => debug!("Bridge launch delegated to the OS"),
            Ok(LaunchOutcome::NotInstalled) => {
                info!("Bridge program is not installed");
                self.core.emit(SessionEvent::InstallPromptRequested);
            }
            Err(LaunchError::UnsupportedHost { message, .. }) => {
                warn!("Cannot launch the bridge here: {message}");
                self.core.emit(SessionEvent::Notice(Notice::unsupported_host(message)));
            }
            Err(e) => warn!("Bridge launch failed: {e}"),
        }
    }

    fn stop(&mut self) {
        self.reopen_at = None;
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
        self.pool.close_all();
    }

    pub(crate) fn snapshot(&self) -> SessionStatus {
        SessionStatus {
            state: self.core.state(),
            connected: self.core.is_connected(),
            device: self.core.selected_device().cloned(),
            module: self.core.module_name(),
            endpoint: self.pool.active_endpoint().map(|e| e.to_string()),
            mode: self.core.mode(),
            generation: self.pool.generation(),
            candidates: self.pool.listener_count(),
            launch_active: self.launch_active,
        }
    }
}

/// Store `snapshot` if it differs from the published status.
///
/// The actor owns `Send`-only host objects; no borrow of it may be held
/// across an await.
pub(crate) async fn publish_status(status: &RwLock<SessionStatus>, snapshot: SessionStatus) {
    let mut status = status.write().await;
    if *status != snapshot {
        *status = snapshot;
    }
}
