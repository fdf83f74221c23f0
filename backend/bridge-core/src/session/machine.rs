//! Session state machine, port store and update pump.
//!
//! [`SessionCore`] knows nothing about sockets or timers. The actor feeds it
//! transport events that already passed the active-transport filter, host
//! commands, and pump ticks with a [`FrameSink`] for the active transport.

use crate::device::{DeviceKey, DeviceRegistry, DeviceResolver, HardwareContext, MonitorPanel, Resolution};
use crate::ports::{PortData, PortId, SendQueue};
use crate::session::events::{Notice, SessionEvent};
use crate::session::state::ConnectionState;
use crate::session::WorkspaceHook;
use crate::transport::wire::{ControlDirective, InboundPayload};
use crate::transport::{FrameSink, InboundMessage, OutboundMessage};

use std::sync::Arc;

use log::{debug, info, trace, warn};
use serde_json::Value;
use tokio::sync::mpsc;

const DISCONNECTED_READING: i64 = 0;
const MODE_COMMAND: i64 = 0;
const MODE_RAW: i64 = 1;

pub(crate) struct SessionCore {
    state: ConnectionState,
    mode: Option<i64>,
    port_data: PortData,
    send_queue: SendQueue,
    resolver: DeviceResolver,
    workspace: Option<Arc<dyn WorkspaceHook>>,
    panel: Option<Box<dyn MonitorPanel>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionCore {
    pub(crate) fn new(
        registry: DeviceRegistry,
        workspace: Option<Arc<dyn WorkspaceHook>>,
        panel: Option<Box<dyn MonitorPanel>>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            mode: None,
            port_data: PortData::new(),
            send_queue: SendQueue::new(),
            resolver: DeviceResolver::new(registry),
            workspace,
            panel,
            events,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub(crate) fn mode(&self) -> Option<i64> {
        self.mode
    }

    pub(crate) fn port_data(&self) -> &PortData {
        &self.port_data
    }

    pub(crate) fn send_queue(&self) -> &SendQueue {
        &self.send_queue
    }

    pub(crate) fn selected_device(&self) -> Option<&DeviceKey> {
        self.resolver.selected()
    }

    pub(crate) fn module_name(&self) -> Option<String> {
        self.resolver.module().map(|m| m.name().to_string())
    }

    pub(crate) fn event_sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events.clone()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("No listener for session events");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!("Hardware session {} -> {}", self.state, state);
            self.state = state;
        }
    }

    // ============================================
    // TRANSPORT EVENTS
    // ============================================

    /// A new pool generation is dialling.
    pub(crate) fn on_pool_reopen(&mut self) {
        self.mode = None;
        self.set_state(ConnectionState::Connecting);
        self.emit(SessionEvent::SessionChanged);
    }

    /// Every candidate of the generation gave up before connecting.
    pub(crate) fn on_pool_exhausted(&mut self) {
        debug!("All transport candidates gave up");
        self.set_state(ConnectionState::Disconnected);
        self.emit(SessionEvent::SessionChanged);
    }

    /// The active transport completed its handshake.
    pub(crate) fn on_transport_connected(&mut self) {
        self.set_state(ConnectionState::Connected);
        self.emit(SessionEvent::SessionChanged);
        if let Some(workspace) = &self.workspace {
            workspace.refresh_hardware_menu();
        }
    }

    /// `mode` side channel. A command-to-raw switch ends the session.
    pub(crate) fn on_mode(&mut self, mode: i64) {
        if self.mode == Some(MODE_COMMAND) && mode == MODE_RAW {
            info!("Bridge switched from command mode to raw mode");
            self.disconnect_hardware();
        }
        self.mode = Some(mode);
    }

    /// Data from the active transport.
    ///
    /// Dropped while a generation is still dialling. After a directive or a
    /// mode downgrade the transport stays up, and the next identification
    /// record resumes the session.
    pub(crate) fn on_message(&mut self, message: &InboundMessage) {
        if self.state == ConnectionState::Connecting {
            trace!("Ignoring inbound message while {}", self.state);
            return;
        }

        match message.payload() {
            InboundPayload::Empty => trace!("Empty inbound message"),
            InboundPayload::Control(ControlDirective::Disconnect) => {
                info!("Bridge requested disconnect");
                self.disconnect_hardware();
            }
            InboundPayload::Record(record) => {
                let resumed = !self.is_connected() && DeviceKey::from_record(&record).is_some();
                if resumed {
                    info!("Bridge announced a device; resuming hardware session");
                    self.set_state(ConnectionState::Connected);
                    if let Some(workspace) = &self.workspace {
                        workspace.refresh_hardware_menu();
                    }
                }
                self.apply_record(record, resumed);
            }
            InboundPayload::Malformed(text) => warn!("Skipping malformed inbound data: {text}"),
        }
    }

    fn apply_record(&mut self, record: PortData, resumed: bool) {
        let resolution = self.resolver.resolve(&record, self.panel.as_deref_mut());

        match &resolution {
            Resolution::Bound(key) => {
                debug!("Device {key} bound");
                self.emit(SessionEvent::SessionChanged);

                if let Some(module) = self.resolver.module() {
                    let monitored = self.panel.is_some() && module.monitor_template().is_some();
                    let notice = Notice::device_connected(module.name(), monitored);
                    self.emit(SessionEvent::Notice(notice));
                }
            }
            _ if resumed => self.emit(SessionEvent::SessionChanged),
            _ => {}
        }

        self.port_data = record;

        if let Some(panel) = &self.panel
            && panel.is_selected()
            && let Some(monitor) = self.resolver.monitor_mut()
        {
            monitor.update(&self.port_data, &self.send_queue);
        }

        if let Some(module) = self.resolver.module()
            && module.capabilities().after_receive
        {
            module.after_receive(&self.port_data);
        }
    }

    /// Terminal disconnect: directive, mode downgrade or explicit close.
    ///
    /// Safe to call repeatedly; each call re-emits the notifications.
    pub(crate) fn disconnect_hardware(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.resolver.unbind(self.panel.as_deref_mut());
        self.emit(SessionEvent::SessionChanged);
        self.emit(SessionEvent::Notice(Notice::terminated()));
    }

    // ============================================
    // PORT ACCESS
    // ============================================

    /// Stage a write. Write intent overrides a pending read request.
    pub(crate) fn set_digital_out(&mut self, port: PortId, value: Value) {
        self.send_queue.unmark_readable(&port);
        self.send_queue.set(port, value);
    }

    /// `a<index>` from the last snapshot; `None` if never reported.
    pub(crate) fn get_analog_in(&self, index: u32) -> Option<Value> {
        if !self.is_connected() {
            return Some(Value::from(DISCONNECTED_READING));
        }
        self.port_data.get(&PortId::analog(index)).cloned()
    }

    /// Declares read interest in `port` and returns its last value.
    pub(crate) fn get_digital_in(&mut self, port: PortId) -> Value {
        if !self.is_connected() {
            return Value::from(DISCONNECTED_READING);
        }
        let value = self
            .port_data
            .get(&port)
            .cloned()
            .unwrap_or_else(|| Value::from(DISCONNECTED_READING));
        self.send_queue.mark_readable(port);
        value
    }

    pub(crate) fn mark_readable(&mut self, port: PortId) {
        self.send_queue.mark_readable(port);
    }

    pub(crate) fn unmark_readable(&mut self, port: &PortId) {
        self.send_queue.unmark_readable(port);
    }

    // ============================================
    // PUMP & HOST SIGNALS
    // ============================================

    /// One update-pump step. The queue is read, never drained.
    ///
    /// Idle unless connected: a live transport may outlast the session.
    pub(crate) fn tick(&mut self, sink: &mut dyn FrameSink) {
        if !self.is_connected() || !sink.is_live() {
            return;
        }

        if let Some(module) = self.resolver.module().cloned()
            && module.capabilities().custom_send
        {
            let mut context =
                HardwareContext::new(&mut self.send_queue, &self.port_data, self.mode, sink);
            if let Err(e) = module.send_message(&mut context) {
                debug!("{} failed to send: {e}", module.name());
            }
            return;
        }

        match OutboundMessage::from_queue(&self.send_queue, self.mode) {
            Ok(message) => {
                if let Err(e) = sink.send(&message) {
                    debug!("Update pump send failed: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize send queue: {e}"),
        }
    }

    /// Host "stop" signal, forwarded to the bound module.
    pub(crate) fn set_zero(&mut self, sink: &mut dyn FrameSink) {
        let Some(module) = self.resolver.module().cloned() else {
            return;
        };
        if !module.capabilities().set_zero {
            return;
        }

        let mut context =
            HardwareContext::new(&mut self.send_queue, &self.port_data, self.mode, sink);
        if let Err(e) = module.set_zero(&mut context) {
            warn!("{} failed to reset outputs: {e}", module.name());
        }
    }

    /// Disable the block class of every registered module.
    pub(crate) fn ban_registered_modules(&self) {
        let Some(workspace) = &self.workspace else {
            return;
        };
        for name in self.resolver.registry().module_names() {
            workspace.ban_block_class(&name);
        }
    }
}
