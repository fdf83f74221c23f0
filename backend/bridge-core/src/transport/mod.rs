//! Transport pool for the bridge connection.
//!
//! Several candidate endpoints are dialled at once (the loopback bridge and
//! the relays) because which one can succeed depends on where the host runs.
//! Each candidate is a task that owns its socket and reports
//! [`TransportEvent`]s tagged with a [`CandidateId`]. The pool decides which
//! candidate is *the* active transport; everything else is ignored for data.
//!
//! # Cancellation
//!
//! Every reopen bumps the pool generation and aborts all candidate tasks of
//! the previous generation before new ones are spawned. Events that still
//! carry an old generation are dropped by the session.

mod candidate;
mod pool;
mod probe;
pub mod wire;

pub use pool::{ActiveSink, TransportPool};
pub use probe::probe_legacy_bridge;
pub use wire::{InboundMessage, OutboundMessage};

use crate::error::transport::TransportError;
use crate::identity::SessionId;

use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use url::Url;

const SOCKET_PATH: &str = "/socket.io/";
const ENGINE_VERSION: &str = "3";
const ENGINE_TRANSPORT: &str = "websocket";

// ============================================
// IDENTIFIERS & EVENTS
// ============================================

/// A candidate within one pool generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateId {
    pub generation: u64,
    pub slot: usize,
}

impl Display for CandidateId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}#{}", self.generation, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    Connected,
    Mode(i64),
    Message(InboundMessage),
    Disconnected,
    /// Reconnect attempts exhausted before the candidate ever connected.
    GaveUp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub source: CandidateId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(source: CandidateId, kind: TransportEventKind) -> Self {
        Self { source, kind }
    }
}

/// Where the update pump writes frames.
pub trait FrameSink {
    /// The transport behind this sink is currently connected.
    fn is_live(&self) -> bool;

    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;
}

// ============================================
// ENDPOINTS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Loopback,
    Relay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub url: Url,
}

impl Endpoint {
    /// Build the socket URL for `base` (`http(s)://host:port`).
    ///
    /// `http` becomes `ws`, `https` becomes `wss`, and the session id is
    /// passed as the `roomId` query parameter.
    #[track_caller]
    pub fn new(
        kind: EndpointKind,
        base: &str,
        session_id: &SessionId,
    ) -> Result<Self, TransportError> {
        let mut url = Url::parse(base)?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::Endpoint {
                    message: format!("Unsupported endpoint scheme {other} in {base}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        url.set_scheme(scheme).map_err(|_| TransportError::Endpoint {
            message: format!("Cannot switch {base} to {scheme}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        url.set_path(SOCKET_PATH);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", ENGINE_VERSION)
            .append_pair("transport", ENGINE_TRANSPORT)
            .append_pair("client", "true")
            .append_pair("roomId", session_id.as_str());

        Ok(Self { kind, url })
    }
}

impl Display for Endpoint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let host = self.url.host_str().unwrap_or("?");
        match self.url.port() {
            Some(port) => write!(formatter, "{host}:{port}"),
            None => write!(formatter, "{host}"),
        }
    }
}

// ============================================
// RECONNECT POLICY
// ============================================

/// Reconnection limits shared by every candidate of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after the first failed attempt.
    pub attempts: u32,
    /// Limit used once the launch flow has been invoked.
    pub raised_attempts: u32,
    pub delay: Duration,
    /// Upper bound for any single wait between attempts.
    pub delay_max: Duration,
    /// Budget for one connection attempt, handshake included.
    pub timeout: Duration,
}

impl ReconnectPolicy {
    pub fn raise_attempts(&mut self) {
        self.attempts = self.attempts.max(self.raised_attempts);
    }

    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.delay,
            initial_interval: self.delay,
            max_interval: self.delay_max,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Next wait, never above `delay_max` (jitter included).
    pub(crate) fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
        backoff
            .next_backoff()
            .unwrap_or(self.delay_max)
            .min(self.delay_max)
    }
}
