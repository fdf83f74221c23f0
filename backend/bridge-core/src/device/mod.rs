//! Device modules and their resolution.
//!
//! The bridge announces the attached board with an identification record
//! carrying `company` and `model`. Those two numbers form a [`DeviceKey`];
//! the host registers one [`DeviceModule`] per key it knows about.

mod monitor;
mod resolver;

pub use monitor::{DisplayMode, MonitorPanel, MonitorTemplate, MonitorView};
pub use resolver::{DeviceResolver, Resolution};

use crate::error::transport::TransportError;
use crate::ports::{PortData, SendQueue};
use crate::transport::{FrameSink, OutboundMessage};

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// DEVICE KEY
// ============================================

/// `lowercase-hex(company) + "." + lowercase-hex(model)`, e.g. `a.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn new(company: u64, model: u64) -> Self {
        Self(format!("{company:x}.{model:x}"))
    }

    /// Key of an identification record.
    ///
    /// `None` when the record has no company, i.e. it is a plain status
    /// update. A missing model counts as model 0.
    pub fn from_record(record: &PortData) -> Option<Self> {
        let company = hex_field(record.company()?)?;
        let model = record.model().and_then(hex_field).unwrap_or_else(|| "0".to_string());
        Some(Self(format!("{company}.{model}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn hex_field(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .map(|n| format!("{n:x}"))
            .or_else(|| number.as_i64().map(|n| format!("{n:x}"))),
        Value::String(text) if !text.is_empty() => Some(text.to_lowercase()),
        _ => None,
    }
}

impl Display for DeviceKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for DeviceKey {
    fn from(value: &str) -> Self {
        Self(value.to_lowercase())
    }
}

// ============================================
// DEVICE MODULE
// ============================================

/// Optional hooks a module actually implements.
///
/// The session consults these flags instead of calling every hook
/// unconditionally: a module without `custom_send` gets the default
/// serialized send queue each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub custom_send: bool,
    pub after_receive: bool,
    pub data_handler: bool,
    pub set_zero: bool,
}

/// What a module may touch while it runs inside the session.
pub struct HardwareContext<'a> {
    pub send_queue: &'a mut SendQueue,
    pub port_data: &'a PortData,
    pub mode: Option<i64>,
    sink: &'a mut dyn FrameSink,
}

impl<'a> HardwareContext<'a> {
    pub fn new(
        send_queue: &'a mut SendQueue,
        port_data: &'a PortData,
        mode: Option<i64>,
        sink: &'a mut dyn FrameSink,
    ) -> Self {
        Self {
            send_queue,
            port_data,
            mode,
            sink,
        }
    }

    pub fn is_live(&self) -> bool {
        self.sink.is_live()
    }

    /// Write one message to the active transport.
    pub fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.sink.send(message)
    }

    /// Write the send queue the way the default pump would.
    pub fn send_queue_now(&mut self) -> Result<(), TransportError> {
        let message = OutboundMessage::from_queue(&*self.send_queue, self.mode)?;
        self.sink.send(&message)
    }
}

/// Device-specific behaviour registered by the host.
///
/// Every hook has a no-op default; [`DeviceModule::capabilities`] declares
/// which ones the module overrides.
pub trait DeviceModule: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn monitor_template(&self) -> Option<MonitorTemplate> {
        None
    }

    /// Replaces the default pump when `custom_send` is set.
    fn send_message(&self, _context: &mut HardwareContext<'_>) -> Result<(), TransportError> {
        Ok(())
    }

    /// Called with the new snapshot after every record.
    fn after_receive(&self, _port_data: &PortData) {}

    /// Called with records from the device that is already bound.
    fn data_handler(&self, _record: &PortData) {}

    /// Host "stop" signal: drive every output back to rest.
    fn set_zero(&self, _context: &mut HardwareContext<'_>) -> Result<(), TransportError> {
        Ok(())
    }
}

// ============================================
// REGISTRY
// ============================================

/// Static mapping from device key to module, supplied by the host.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    modules: HashMap<DeviceKey, Arc<dyn DeviceModule>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, key: impl Into<DeviceKey>, module: Arc<dyn DeviceModule>) -> Self {
        self.register(key, module);
        self
    }

    pub fn register(&mut self, key: impl Into<DeviceKey>, module: Arc<dyn DeviceModule>) {
        self.modules.insert(key.into(), module);
    }

    pub fn get(&self, key: &DeviceKey) -> Option<Arc<dyn DeviceModule>> {
        self.modules.get(key).cloned()
    }

    /// Module names in key order.
    pub fn module_names(&self) -> Vec<String> {
        let mut entries: Vec<(&DeviceKey, &Arc<dyn DeviceModule>)> = self.modules.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(_, module)| module.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("DeviceRegistry")
            .field("modules", &self.module_names())
            .finish()
    }
}
