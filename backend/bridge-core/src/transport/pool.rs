use crate::config::BridgeConfig;
use crate::error::transport::TransportError;
use crate::identity::SessionId;
use crate::transport::candidate::CandidateHandle;
use crate::transport::wire::OutboundMessage;
use crate::transport::{
    CandidateId, Endpoint, EndpointKind, FrameSink, ReconnectPolicy, TransportEvent,
};

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, info, warn};
use tokio::sync::mpsc;

/// Owns every transport candidate of the session and tracks which one is
/// the active transport.
pub struct TransportPool {
    loopback_url: String,
    relay_urls: Vec<String>,
    secure_host: bool,
    policy: ReconnectPolicy,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    generation: u64,
    candidates: Vec<CandidateHandle>,
    active: Option<CandidateId>,
}

impl TransportPool {
    pub fn new(config: &BridgeConfig, events_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            loopback_url: config.transport.loopback_url.clone(),
            relay_urls: config.transport.relay_urls.clone(),
            secure_host: config.secure_host,
            policy: config.reconnect_policy(),
            events_tx,
            generation: 0,
            candidates: Vec::new(),
            active: None,
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Applies to candidates spawned from now on.
    pub fn raise_attempt_limit(&mut self) {
        self.policy.raise_attempts();
        debug!("Reconnect attempt limit raised to {}", self.policy.attempts);
    }

    /// Close every candidate, then dial a fresh generation.
    ///
    /// Returns the number of candidates that were started. A candidate whose
    /// endpoint cannot be built is logged and left out.
    pub fn open_all(&mut self, session_id: &SessionId) -> usize {
        self.close_all();
        self.generation += 1;

        let mut bases: Vec<(EndpointKind, &str)> = Vec::with_capacity(self.relay_urls.len() + 1);
        if !self.secure_host {
            bases.push((EndpointKind::Loopback, self.loopback_url.as_str()));
        }
        bases.extend(
            self.relay_urls
                .iter()
                .map(|url| (EndpointKind::Relay, url.as_str())),
        );

        let mut started = Vec::with_capacity(bases.len());
        for (kind, base) in bases {
            match Endpoint::new(kind, base, session_id) {
                Ok(endpoint) => {
                    let id = CandidateId {
                        generation: self.generation,
                        slot: started.len(),
                    };
                    debug!("Dialling candidate {id} at {endpoint}");
                    started.push(CandidateHandle::spawn(
                        id,
                        endpoint,
                        self.policy,
                        self.events_tx.clone(),
                    ));
                }
                Err(e) => warn!("Skipping transport candidate {base}: {e}"),
            }
        }

        self.candidates = started;
        info!(
            "Transport pool generation {} opened with {} candidates",
            self.generation,
            self.candidates.len()
        );
        self.candidates.len()
    }

    /// Abort every candidate task and forget the active transport.
    pub fn close_all(&mut self) {
        if !self.candidates.is_empty() {
            debug!(
                "Closing {} candidates of generation {}",
                self.candidates.len(),
                self.generation
            );
        }
        self.candidates.clear();
        self.active = None;
    }

    /// The event belongs to a candidate that is still owned by the pool.
    pub fn is_current(&self, id: CandidateId) -> bool {
        id.generation == self.generation && self.candidates.iter().any(|c| c.id == id)
    }

    /// Make `id` the active transport if none has been chosen this
    /// generation. Returns whether `id` is now the active transport.
    pub fn promote(&mut self, id: CandidateId) -> bool {
        if !self.is_current(id) {
            return false;
        }
        match self.active {
            Some(active) => active == id,
            None => {
                self.active = Some(id);
                if let Some(endpoint) = self.active_endpoint() {
                    info!("Candidate {id} at {endpoint} is the active transport");
                }
                true
            }
        }
    }

    pub fn active(&self) -> Option<CandidateId> {
        self.active
    }

    pub fn is_active(&self, id: CandidateId) -> bool {
        self.active == Some(id)
    }

    pub fn active_endpoint(&self) -> Option<&Endpoint> {
        self.active_candidate().map(|c| &c.endpoint)
    }

    pub fn has_live_transport(&self) -> bool {
        self.active_candidate().is_some_and(CandidateHandle::is_live)
    }

    pub fn reset_attempts(&self, id: CandidateId) {
        if let Some(candidate) = self.candidates.iter().find(|c| c.id == id) {
            candidate.reset_attempts();
        }
    }

    pub fn attempts(&self, id: CandidateId) -> Option<u32> {
        self.candidates
            .iter()
            .find(|c| c.id == id)
            .map(CandidateHandle::attempts)
    }

    /// Forget a candidate that gave up. Returns whether none are left.
    pub fn retire(&mut self, id: CandidateId) -> bool {
        self.candidates.retain(|c| c.id != id);
        self.candidates.is_empty()
    }

    /// Number of candidate tasks currently owned by the pool.
    pub fn listener_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Frame sink writing to the active transport.
    pub fn sink(&self) -> ActiveSink<'_> {
        ActiveSink {
            candidate: self.active_candidate(),
        }
    }

    fn active_candidate(&self) -> Option<&CandidateHandle> {
        let active = self.active?;
        self.candidates.iter().find(|c| c.id == active)
    }
}

pub struct ActiveSink<'a> {
    candidate: Option<&'a CandidateHandle>,
}

impl FrameSink for ActiveSink<'_> {
    fn is_live(&self) -> bool {
        self.candidate.is_some_and(CandidateHandle::is_live)
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let Some(candidate) = self.candidate else {
            return Err(TransportError::Send {
                message: "No active transport".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };
        candidate.send(message.to_frame()?)
    }
}
