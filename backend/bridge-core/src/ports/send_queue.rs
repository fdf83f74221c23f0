use crate::ports::PortId;

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const READABLE_PORTS_KEY: &str = "readablePorts";

/// Pending writes plus the ordered, deduplicated read-interest list.
///
/// The update pump serializes this as-is every tick; nothing here is drained
/// by sending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendQueue {
    #[serde(
        rename = "readablePorts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    readable_ports: Option<Vec<PortId>>,

    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an outbound value for `port`.
    pub fn set(&mut self, port: impl Into<PortId>, value: impl Into<Value>) {
        let port = port.into();
        if port.as_str() == READABLE_PORTS_KEY {
            warn!("Refusing to stage a value under the reserved key {READABLE_PORTS_KEY}");
            return;
        }
        self.values.insert(port.into_string(), value.into());
    }

    pub fn get(&self, port: &PortId) -> Option<&Value> {
        self.values.get(port.as_str())
    }

    /// Explicitly drop a staged value.
    pub fn remove(&mut self, port: &PortId) -> Option<Value> {
        self.values.remove(port.as_str())
    }

    /// Drop every staged value and the interest list.
    pub fn clear(&mut self) {
        self.values.clear();
        self.readable_ports = None;
    }

    /// Add `port` to the interest list unless already present.
    pub fn mark_readable(&mut self, port: impl Into<PortId>) {
        let port = port.into();
        let readable = self.readable_ports.get_or_insert_with(Vec::new);
        if !readable.contains(&port) {
            readable.push(port);
        }
    }

    /// Remove `port` from the interest list, keeping the order of the rest.
    pub fn unmark_readable(&mut self, port: &PortId) {
        if let Some(readable) = self.readable_ports.as_mut()
            && let Some(index) = readable.iter().position(|p| p == port)
        {
            readable.remove(index);
        }
    }

    pub fn readable_ports(&self) -> &[PortId] {
        self.readable_ports.as_deref().unwrap_or(&[])
    }

    pub fn is_readable(&self, port: &PortId) -> bool {
        self.readable_ports().contains(port)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
