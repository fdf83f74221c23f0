//! Bridge wire codec.
//!
//! The bridge speaks Socket.IO v2 on an Engine.IO v3 websocket. Only the
//! packets the session needs are modelled:
//!
//! | text   | packet                       |
//! |--------|------------------------------|
//! | `0{..}`| open (heartbeat settings)    |
//! | `1`    | close                        |
//! | `2`    | ping                         |
//! | `3`    | pong                         |
//! | `40`   | namespace connect            |
//! | `41`   | namespace disconnect         |
//! | `42[..]` | event `[name, arg]`        |

use crate::error::transport::TransportError;
use crate::ports::{PortData, SendQueue};

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PING: &str = "2";
pub const PONG: &str = "3";
pub const MESSAGE_EVENT: &str = "message";
pub const MODE_EVENT: &str = "mode";
pub const DISCONNECT_DIRECTIVE: &str = "disconnectHardware";
pub const OUTBOUND_ENCODING: &str = "utf8";

const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;

/// Engine.IO handshake payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenInfo {
    #[serde(default)]
    pub sid: String,
    #[serde(rename = "pingInterval", default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    #[serde(rename = "pingTimeout", default)]
    pub ping_timeout_ms: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

impl OpenInfo {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Connect,
    Disconnect,
    Event { name: String, data: Value },
    Other(String),
}

/// Decode one text frame.
#[track_caller]
pub fn decode(text: &str) -> Result<Packet, TransportError> {
    let mut chars = text.chars();
    let Some(engine_type) = chars.next() else {
        return Err(codec_error("Empty frame"));
    };
    let rest = chars.as_str();

    match engine_type {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        _ => Ok(Packet::Other(text.to_string())),
    }
}

#[track_caller]
fn decode_socket_packet(text: &str) -> Result<Packet, TransportError> {
    let mut chars = text.chars();
    let socket_type = chars.next();
    let rest = chars.as_str();

    match socket_type {
        Some('0') => Ok(Packet::Connect),
        Some('1') => Ok(Packet::Disconnect),
        Some('2') => {
            // Namespace and ack id may precede the argument array.
            let start = rest
                .find('[')
                .ok_or_else(|| codec_error(format!("Event packet without arguments: {text}")))?;
            let mut args: Vec<Value> = serde_json::from_str(&rest[start..])?;
            if args.is_empty() {
                return Err(codec_error("Event packet without a name"));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => return Err(codec_error(format!("Event name is not a string: {other}"))),
            };
            let data = if args.is_empty() {
                Value::Null
            } else {
                args.remove(0)
            };
            Ok(Packet::Event { name, data })
        }
        _ => Ok(Packet::Other(format!("4{text}"))),
    }
}

/// Encode an event packet `42["name",data]`.
pub fn encode_event<T: Serialize>(name: &str, data: &T) -> Result<String, TransportError> {
    let args = serde_json::to_string(&(name, data))?;
    Ok(format!("42{args}"))
}

#[track_caller]
fn codec_error(message: impl Into<String>) -> TransportError {
    TransportError::Codec {
        message: message.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}

// ============================================
// MESSAGE SHAPES
// ============================================

/// Argument of an inbound `message` event: `{ data, version? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDirective {
    Disconnect,
}

/// What an inbound message means for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// No data at all: nothing to do.
    Empty,
    Control(ControlDirective),
    Record(PortData),
    /// Data was present but is not a record. Logged and skipped.
    Malformed(String),
}

impl InboundMessage {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            version: None,
        }
    }

    pub fn payload(&self) -> InboundPayload {
        match &self.data {
            Value::Null => InboundPayload::Empty,
            Value::String(text) if text.is_empty() => InboundPayload::Empty,
            Value::String(text) if text == DISCONNECT_DIRECTIVE => {
                InboundPayload::Control(ControlDirective::Disconnect)
            }
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => PortData::from_value(value)
                    .map(InboundPayload::Record)
                    .unwrap_or_else(|| InboundPayload::Malformed(text.clone())),
                Err(e) => InboundPayload::Malformed(format!("{e}: {text}")),
            },
            Value::Object(_) => PortData::from_value(self.data.clone())
                .map(InboundPayload::Record)
                .unwrap_or(InboundPayload::Empty),
            other => InboundPayload::Malformed(other.to_string()),
        }
    }
}

/// Argument of an outbound `message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// JSON text of the send queue (or a module-defined payload).
    pub data: String,
    pub mode: Option<i64>,
    #[serde(rename = "type")]
    pub encoding: String,
}

impl OutboundMessage {
    pub fn new(data: String, mode: Option<i64>) -> Self {
        Self {
            data,
            mode,
            encoding: OUTBOUND_ENCODING.to_string(),
        }
    }

    pub fn from_queue(queue: &SendQueue, mode: Option<i64>) -> Result<Self, TransportError> {
        Ok(Self::new(queue.to_json()?, mode))
    }

    /// Parse `data` back into a send queue (used by the bridge side and tests).
    pub fn decode_queue(&self) -> Result<SendQueue, TransportError> {
        Ok(SendQueue::from_json(&self.data)?)
    }

    /// Full text frame for this message.
    pub fn to_frame(&self) -> Result<String, TransportError> {
        encode_event(MESSAGE_EVENT, self)
    }
}
