use crate::device::{DeviceKey, DeviceModule, DeviceRegistry, DisplayMode, MonitorPanel, MonitorView};
use crate::ports::PortData;

use std::sync::Arc;

use log::{debug, info};

/// Outcome of feeding one record to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No company field: a plain status update.
    StatusOnly,
    /// The record came from the device that is already selected.
    SameDevice,
    /// A new key with no registered module. Nothing is bound.
    Unknown(DeviceKey),
    /// A new key whose module is now bound.
    Bound(DeviceKey),
}

/// Tracks the selected device and its module binding.
pub struct DeviceResolver {
    registry: DeviceRegistry,
    selected: Option<DeviceKey>,
    module: Option<Arc<dyn DeviceModule>>,
    monitor: Option<Box<dyn MonitorView>>,
}

impl DeviceResolver {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            selected: None,
            module: None,
            monitor: None,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Key of the last identification record, bound or not.
    pub fn selected(&self) -> Option<&DeviceKey> {
        self.selected.as_ref()
    }

    pub fn module(&self) -> Option<&Arc<dyn DeviceModule>> {
        self.module.as_ref()
    }

    pub fn has_monitor(&self) -> bool {
        self.monitor.is_some()
    }

    pub fn monitor_mut(&mut self) -> Option<&mut (dyn MonitorView + 'static)> {
        self.monitor.as_deref_mut()
    }

    /// Decide the binding for `record`.
    ///
    /// With a panel and a module that has a monitor template, the monitor is
    /// created on first bind and rebound afterwards, then rendered per the
    /// template's display mode.
    pub fn resolve(
        &mut self,
        record: &PortData,
        panel: Option<&mut (dyn MonitorPanel + 'static)>,
    ) -> Resolution {
        let Some(key) = DeviceKey::from_record(record) else {
            return Resolution::StatusOnly;
        };

        if self.selected.as_ref() == Some(&key) {
            if let Some(module) = &self.module
                && module.capabilities().data_handler
            {
                module.data_handler(record);
            }
            return Resolution::SameDevice;
        }

        self.selected = Some(key.clone());
        self.module = self.registry.get(&key);

        let Some(module) = self.module.clone() else {
            debug!("No device module registered for {key}");
            return Resolution::Unknown(key);
        };

        info!("Bound device module {} for {key}", module.name());

        if let (Some(panel), Some(template)) = (panel, module.monitor_template()) {
            let monitor = match self.monitor.take() {
                Some(mut monitor) => {
                    monitor.rebind(Arc::clone(&module));
                    monitor.init_view();
                    monitor
                }
                None => panel.create_view(Arc::clone(&module)),
            };
            let monitor = self.monitor.insert(monitor);
            panel.add_mode();

            match template.mode {
                DisplayMode::Both => {
                    monitor.generate_list_view();
                    monitor.generate_view();
                }
                DisplayMode::List => monitor.generate_list_view(),
                DisplayMode::General => monitor.generate_view(),
            }
        }

        Resolution::Bound(key)
    }

    /// Drop the binding and take the monitor mode off the panel.
    ///
    /// The monitor view itself is kept for the next bind.
    pub fn unbind(&mut self, panel: Option<&mut (dyn MonitorPanel + 'static)>) {
        if self.selected.take().is_some() {
            debug!("Device selection cleared");
        }
        self.module = None;
        if let (Some(panel), Some(_)) = (panel, self.monitor.as_ref()) {
            panel.remove_mode();
        }
    }
}
