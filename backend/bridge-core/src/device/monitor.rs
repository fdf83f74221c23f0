//! Host-side monitor UI, seen only through its interface.

use crate::device::DeviceModule;
use crate::ports::{PortData, PortId, SendQueue};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    List,
    #[default]
    General,
    /// List view first, then the general view.
    Both,
}

/// How a module wants its ports shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTemplate {
    #[serde(default)]
    pub mode: DisplayMode,
    #[serde(default)]
    pub ports: Vec<PortId>,
}

/// The monitor view of one device module.
pub trait MonitorView: Send {
    /// Point an existing view at a newly bound module.
    fn rebind(&mut self, module: Arc<dyn DeviceModule>);
    fn init_view(&mut self);
    fn generate_list_view(&mut self);
    fn generate_view(&mut self);
    fn update(&mut self, port_data: &PortData, send_queue: &SendQueue);
}

/// The property panel that hosts the "hw" monitor mode.
pub trait MonitorPanel: Send {
    fn create_view(&mut self, module: Arc<dyn DeviceModule>) -> Box<dyn MonitorView>;
    fn add_mode(&mut self);
    fn remove_mode(&mut self);
    /// The "hw" mode is the one currently shown.
    fn is_selected(&self) -> bool;
}
