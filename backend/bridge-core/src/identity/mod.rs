//! Per-profile session identity.
//!
//! The bridge and the relays pair a client with the right bridge instance by
//! a short room id. It is generated once, persisted under
//! [`SESSION_ROOM_ID_KEY`], and reused for the lifetime of the profile.

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use std::fmt::{Display, Formatter, Result as FormatResult};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_ROOM_ID_KEY: &str = "sessionRoomId";
pub const SESSION_ID_LEN: usize = 10;

/// Position of the variant nibble inside the id (UUID-v4 style `y`).
const VARIANT_POSITION: usize = 8;

static SESSION_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{8}[89ab][0-9a-f]$").expect("valid regex pattern"));

/// Opaque 10 character room id, `xxxxxxxxyx` where `y` is one of `8 9 a b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh id from v4 UUID randomness.
    pub fn generate() -> Self {
        let random = Uuid::new_v4().into_bytes();

        let id = random
            .iter()
            .take(SESSION_ID_LEN)
            .enumerate()
            .map(|(index, byte)| {
                let nibble = byte & 0x0f;
                let nibble = if index == VARIANT_POSITION {
                    (nibble & 0x3) | 0x8
                } else {
                    nibble
                };
                char::from_digit(u32::from(nibble), 16).unwrap_or('0')
            })
            .collect();

        Self(id)
    }

    /// Accept a persisted value only if it has the generated shape.
    pub fn parse(value: &str) -> Option<Self> {
        SESSION_ID_PATTERN
            .is_match(value)
            .then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

/// Read the persisted room id, generating and persisting one when absent.
///
/// Never fails: store errors are logged and the generated id is still used
/// for this run.
pub fn get_or_create_session_id(store: &dyn KeyValueStore) -> SessionId {
    match store.get(SESSION_ROOM_ID_KEY) {
        Ok(Some(value)) => {
            if let Some(id) = SessionId::parse(&value) {
                debug!("Using persisted session id {id}");
                return id;
            }
            warn!("Persisted session id {value:?} is malformed, regenerating");
        }
        Ok(None) => debug!("No persisted session id"),
        Err(e) => warn!("Failed to read session id, generating a new one: {e}"),
    }

    let id = SessionId::generate();

    match store.set(SESSION_ROOM_ID_KEY, id.as_str()) {
        Ok(()) => info!("Generated and persisted session id {id}"),
        Err(e) => warn!("Generated session id {id} but failed to persist it: {e}"),
    }

    id
}
