//! Port data store.
//!
//! [`PortData`] is the last snapshot the bridge reported, replaced wholesale
//! on every inbound record. [`SendQueue`] holds pending writes plus the
//! `readablePorts` interest list and is only ever changed by explicit calls.

mod port_id;
mod send_queue;

pub use port_id::PortId;
pub use send_queue::{READABLE_PORTS_KEY, SendQueue};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const COMPANY_FIELD: &str = "company";
const MODEL_FIELD: &str = "model";

/// Most recent port snapshot received from the bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortData(Map<String, Value>);

impl PortData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret an inbound JSON value as a record. Only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, port: &PortId) -> Option<&Value> {
        self.0.get(port.as_str())
    }

    pub fn insert(&mut self, port: impl Into<PortId>, value: impl Into<Value>) {
        self.0.insert(port.into().into_string(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Company id of an identification record, if this is one.
    pub fn company(&self) -> Option<&Value> {
        self.0.get(COMPANY_FIELD).filter(|v| !v.is_null())
    }

    pub fn model(&self) -> Option<&Value> {
        self.0.get(MODEL_FIELD).filter(|v| !v.is_null())
    }

    /// Analog entries (`a<N>`) in ascending channel order.
    pub fn analog_ports(&self) -> Vec<(u32, &Value)> {
        let mut ports: Vec<(u32, &Value)> = self
            .0
            .iter()
            .filter_map(|(key, value)| {
                PortId::from(key.as_str())
                    .analog_index()
                    .map(|index| (index, value))
            })
            .collect();
        ports.sort_by_key(|(index, _)| *index);
        ports
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
