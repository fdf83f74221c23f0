// Shared fakes for the unit tests: a recording frame sink, a scripted device
// module and recording host collaborators.

use crate::device::{
    Capabilities, DeviceModule, HardwareContext, MonitorPanel, MonitorTemplate, MonitorView,
};
use crate::error::transport::TransportError;
use crate::ports::{PortData, SendQueue};
use crate::session::{SessionEvent, WorkspaceHook};
use crate::transport::{FrameSink, OutboundMessage};

use common::ErrorLocation;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub(crate) fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

// ============================================
// FRAME SINK
// ============================================

pub(crate) struct RecordingSink {
    pub(crate) live: bool,
    pub(crate) fail: bool,
    pub(crate) sent: Vec<OutboundMessage>,
}

impl RecordingSink {
    pub(crate) fn live() -> Self {
        Self {
            live: true,
            fail: false,
            sent: Vec::new(),
        }
    }

    pub(crate) fn dead() -> Self {
        Self {
            live: false,
            ..Self::live()
        }
    }
}

impl FrameSink for RecordingSink {
    fn is_live(&self) -> bool {
        self.live
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Send {
                message: "sink refused".to_string(),
                location: ErrorLocation::here(),
            });
        }
        self.sent.push(message.clone());
        Ok(())
    }
}

// ============================================
// DEVICE MODULE
// ============================================

pub(crate) struct ScriptedModule {
    pub(crate) name: String,
    pub(crate) capabilities: Capabilities,
    pub(crate) template: Option<MonitorTemplate>,
    pub(crate) log: CallLog,
}

impl ScriptedModule {
    pub(crate) fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities::default(),
            template: None,
            log: Arc::clone(log),
        }
    }

    pub(crate) fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub(crate) fn with_template(mut self, template: MonitorTemplate) -> Self {
        self.template = Some(template);
        self
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

impl DeviceModule for ScriptedModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn monitor_template(&self) -> Option<MonitorTemplate> {
        self.template.clone()
    }

    fn send_message(&self, context: &mut HardwareContext<'_>) -> Result<(), TransportError> {
        self.record(format!("{}.send_message", self.name));
        let message = OutboundMessage::new(format!("custom:{}", self.name), context.mode);
        context.send(&message)
    }

    fn after_receive(&self, port_data: &PortData) {
        self.record(format!("{}.after_receive:{}", self.name, port_data.len()));
    }

    fn data_handler(&self, _record: &PortData) {
        self.record(format!("{}.data_handler", self.name));
    }

    fn set_zero(&self, context: &mut HardwareContext<'_>) -> Result<(), TransportError> {
        self.record(format!("{}.set_zero", self.name));
        context.send_queue.clear();
        context.send_queue_now()
    }
}

// ============================================
// HOST COLLABORATORS
// ============================================

pub(crate) struct RecordingPanel {
    pub(crate) log: CallLog,
    pub(crate) selected: bool,
}

impl MonitorPanel for RecordingPanel {
    fn create_view(&mut self, module: Arc<dyn DeviceModule>) -> Box<dyn MonitorView> {
        self.log
            .lock()
            .unwrap()
            .push(format!("panel.create_view:{}", module.name()));
        Box::new(RecordingView {
            log: Arc::clone(&self.log),
        })
    }

    fn add_mode(&mut self) {
        self.log.lock().unwrap().push("panel.add_mode".to_string());
    }

    fn remove_mode(&mut self) {
        self.log.lock().unwrap().push("panel.remove_mode".to_string());
    }

    fn is_selected(&self) -> bool {
        self.selected
    }
}

pub(crate) struct RecordingView {
    log: CallLog,
}

impl MonitorView for RecordingView {
    fn rebind(&mut self, module: Arc<dyn DeviceModule>) {
        self.log
            .lock()
            .unwrap()
            .push(format!("view.rebind:{}", module.name()));
    }

    fn init_view(&mut self) {
        self.log.lock().unwrap().push("view.init_view".to_string());
    }

    fn generate_list_view(&mut self) {
        self.log.lock().unwrap().push("view.list".to_string());
    }

    fn generate_view(&mut self) {
        self.log.lock().unwrap().push("view.general".to_string());
    }

    fn update(&mut self, port_data: &PortData, _send_queue: &SendQueue) {
        self.log
            .lock()
            .unwrap()
            .push(format!("view.update:{}", port_data.len()));
    }
}

pub(crate) struct RecordingWorkspace {
    pub(crate) log: CallLog,
}

impl WorkspaceHook for RecordingWorkspace {
    fn refresh_hardware_menu(&self) {
        self.log.lock().unwrap().push("workspace.refresh".to_string());
    }

    fn ban_block_class(&self, class_name: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("workspace.ban:{class_name}"));
    }
}
