//! One transport candidate: dial, handshake, pump frames, report events.

use crate::error::transport::TransportError;
use crate::transport::wire::{self, InboundMessage, OpenInfo, Packet};
use crate::transport::{
    CandidateId, Endpoint, ReconnectPolicy, TransportEvent, TransportEventKind,
};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type BridgeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FALLBACK_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Pool-owned record of one candidate: its endpoint, task and outbound lane.
///
/// Dropping the handle aborts the task, which closes the socket.
pub(crate) struct CandidateHandle {
    pub(crate) id: CandidateId,
    pub(crate) endpoint: Endpoint,
    outbound_tx: mpsc::UnboundedSender<String>,
    live: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl CandidateHandle {
    pub(crate) fn spawn(
        id: CandidateId,
        endpoint: Endpoint,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn(run_candidate(
            id,
            endpoint.clone(),
            policy,
            events,
            outbound_rx,
            Arc::clone(&live),
            Arc::clone(&attempts),
        ));

        Self {
            id,
            endpoint,
            outbound_tx,
            live,
            attempts,
            task,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    pub(crate) fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound_tx.send(frame).map_err(|e| TransportError::Send {
            message: format!("Candidate {} is gone: {e}", self.id),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Drop for CandidateHandle {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

async fn run_candidate(
    id: CandidateId,
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    live: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
) {
    let mut backoff = policy.backoff();

    loop {
        match timeout(policy.timeout, handshake(&endpoint)).await {
            Ok(Ok((stream, open))) => {
                info!("Candidate {id} connected to {endpoint}");
                live.store(true, Ordering::SeqCst);
                let _ = events.send(TransportEvent::new(id, TransportEventKind::Connected));

                pump(id, stream, open, &events, &mut outbound_rx).await;

                live.store(false, Ordering::SeqCst);
                info!("Candidate {id} disconnected from {endpoint}");
                let _ = events.send(TransportEvent::new(id, TransportEventKind::Disconnected));
                return;
            }
            Ok(Err(e)) => debug!("Candidate {id} failed to connect to {endpoint}: {e}"),
            Err(_) => debug!(
                "Candidate {id} timed out connecting to {endpoint} after {:?}",
                policy.timeout
            ),
        }

        let failed = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if failed > policy.attempts {
            debug!("Candidate {id} giving up on {endpoint} after {failed} attempts");
            let _ = events.send(TransportEvent::new(id, TransportEventKind::GaveUp));
            return;
        }

        let delay = policy.next_delay(&mut backoff);
        trace!("Candidate {id} retrying {endpoint} in {delay:?}");
        sleep(delay).await;
    }
}

/// Open the websocket and wait for the namespace connect packet.
async fn handshake(endpoint: &Endpoint) -> Result<(BridgeStream, Option<OpenInfo>), TransportError> {
    let (mut stream, _) = connect_async(endpoint.url.as_str()).await?;
    let mut open = None;

    while let Some(frame) = stream.next().await {
        let Message::Text(text) = frame? else {
            continue;
        };

        match wire::decode(text.as_str()) {
            Ok(Packet::Open(info)) => open = Some(info),
            Ok(Packet::Connect) => return Ok((stream, open)),
            Ok(Packet::Ping) => stream.send(Message::Text(wire::PONG.into())).await?,
            Ok(Packet::Close) | Ok(Packet::Disconnect) => break,
            Ok(other) => trace!("Ignoring {other:?} before connect from {endpoint}"),
            Err(e) => warn!("Undecodable handshake frame from {endpoint}: {e}"),
        }
    }

    Err(TransportError::Connect {
        message: format!("{endpoint} closed before connecting"),
        location: ErrorLocation::from(Location::caller()),
    })
}

async fn pump(
    id: CandidateId,
    stream: BridgeStream,
    open: Option<OpenInfo>,
    events: &mpsc::UnboundedSender<TransportEvent>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
) {
    let (mut write, mut read) = stream.split();

    let period = open
        .as_ref()
        .map(OpenInfo::ping_interval)
        .unwrap_or(FALLBACK_PING_INTERVAL);
    let mut heartbeat = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match wire::decode(text.as_str()) {
                    Ok(Packet::Event { name, data }) => {
                        if let Some(kind) = event_kind(id, &name, data) {
                            let _ = events.send(TransportEvent::new(id, kind));
                        }
                    }
                    Ok(Packet::Ping) => {
                        if let Err(e) = write.send(Message::Text(wire::PONG.into())).await {
                            debug!("Candidate {id} failed to answer ping: {e}");
                            break;
                        }
                    }
                    Ok(Packet::Close) | Ok(Packet::Disconnect) => break,
                    Ok(other) => trace!("Candidate {id} ignoring {other:?}"),
                    Err(e) => warn!("Candidate {id} received undecodable frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Candidate {id} read error: {e}");
                    break;
                }
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(frame) => {
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        warn!("Candidate {id} failed to send frame: {e}");
                        break;
                    }
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if let Err(e) = write.send(Message::Text(wire::PING.into())).await {
                    debug!("Candidate {id} failed to send heartbeat: {e}");
                    break;
                }
            }
        }
    }
}

fn event_kind(id: CandidateId, name: &str, data: serde_json::Value) -> Option<TransportEventKind> {
    match name {
        wire::MESSAGE_EVENT => match serde_json::from_value::<InboundMessage>(data) {
            Ok(message) => Some(TransportEventKind::Message(message)),
            Err(e) => {
                warn!("Candidate {id} received malformed message event: {e}");
                None
            }
        },
        wire::MODE_EVENT => match data.as_i64() {
            Some(mode) => Some(TransportEventKind::Mode(mode)),
            None => {
                warn!("Candidate {id} received non-numeric mode {data}");
                None
            }
        },
        other => {
            trace!("Candidate {id} ignoring event {other}");
            None
        }
    }
}
