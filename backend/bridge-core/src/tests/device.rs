use crate::device::{
    Capabilities, DeviceKey, DeviceRegistry, DeviceResolver, DisplayMode, MonitorPanel,
    MonitorTemplate, Resolution,
};
use crate::ports::PortData;
use crate::tests::support::{CallLog, RecordingPanel, ScriptedModule, call_log, calls};

use std::sync::Arc;

use serde_json::{Value, json};

fn record(value: Value) -> PortData {
    PortData::from_value(value).unwrap()
}

fn panel(log: &CallLog) -> RecordingPanel {
    RecordingPanel {
        log: Arc::clone(log),
        selected: true,
    }
}

fn template(mode: DisplayMode) -> MonitorTemplate {
    MonitorTemplate {
        mode,
        ports: Vec::new(),
    }
}

// ============================================
// DEVICE KEY
// ============================================

#[test]
fn given_identification_records_when_key_derived_then_lowercase_hex_pair() {
    // GIVEN/WHEN/THEN: company and model in lowercase hex
    assert_eq!(
        DeviceKey::from_record(&record(json!({"company": 10, "model": 1}))),
        Some(DeviceKey::new(10, 1))
    );
    assert_eq!(DeviceKey::new(10, 1).as_str(), "a.1");
    assert_eq!(DeviceKey::new(255, 18).to_string(), "ff.12");
}

#[test]
fn given_record_without_model_when_key_derived_then_model_zero() {
    // GIVEN: Company only
    let data = record(json!({"company": 10}));

    // WHEN/THEN
    assert_eq!(DeviceKey::from_record(&data).unwrap().as_str(), "a.0");
}

#[test]
fn given_status_record_when_key_derived_then_none() {
    // GIVEN/WHEN/THEN: No company, no key
    assert_eq!(DeviceKey::from_record(&record(json!({"a0": 512}))), None);
    assert_eq!(DeviceKey::from_record(&record(json!({"company": null}))), None);
}

#[test]
fn given_string_identity_fields_when_key_derived_then_used_lowercased() {
    // GIVEN/WHEN/THEN: Hex strings pass through lowercased
    let data = record(json!({"company": "0B", "model": "1F"}));
    assert_eq!(DeviceKey::from_record(&data).unwrap(), DeviceKey::from("0b.1f"));
    assert_eq!(DeviceKey::from("A.1"), DeviceKey::new(10, 1));
}

#[test]
fn given_registry_when_listing_modules_then_sorted_by_key() {
    // GIVEN: Modules registered out of key order
    let log = call_log();
    let registry = DeviceRegistry::new()
        .with_module("c.1", Arc::new(ScriptedModule::new("neobot", &log)))
        .with_module("1.1", Arc::new(ScriptedModule::new("arduino", &log)))
        .with_module("a.2", Arc::new(ScriptedModule::new("hamster", &log)));

    // WHEN/THEN: Names follow the key order
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.module_names(), vec!["arduino", "hamster", "neobot"]);
    assert!(registry.get(&DeviceKey::new(10, 2)).is_some());
    assert!(registry.get(&DeviceKey::new(10, 3)).is_none());
}

// ============================================
// RESOLUTION
// ============================================

#[test]
fn given_status_record_when_resolved_then_nothing_bound() {
    // GIVEN: A resolver with one module
    let log = call_log();
    let registry =
        DeviceRegistry::new().with_module("a.1", Arc::new(ScriptedModule::new("hamster", &log)));
    let mut resolver = DeviceResolver::new(registry);

    // WHEN: A status-only record arrives
    let resolution = resolver.resolve(&record(json!({"a0": 1})), None);

    // THEN
    assert_eq!(resolution, Resolution::StatusOnly);
    assert!(resolver.selected().is_none());
    assert!(resolver.module().is_none());
}

/// **VALUE**: An unknown device is remembered but binds nothing.
///
/// **BUG THIS CATCHES**: Would catch the resolver keeping the previous module
/// bound after a different, unregistered board was plugged in.
#[test]
fn given_unknown_key_after_bound_device_when_resolved_then_module_cleared() {
    // GIVEN: A bound device
    let log = call_log();
    let registry =
        DeviceRegistry::new().with_module("a.1", Arc::new(ScriptedModule::new("hamster", &log)));
    let mut resolver = DeviceResolver::new(registry);
    resolver.resolve(&record(json!({"company": 10, "model": 1})), None);

    // WHEN: An unregistered board identifies itself
    let resolution = resolver.resolve(&record(json!({"company": 99, "model": 1})), None);

    // THEN: Selected but unbound
    assert_eq!(resolution, Resolution::Unknown(DeviceKey::new(99, 1)));
    assert_eq!(resolver.selected(), Some(&DeviceKey::new(99, 1)));
    assert!(resolver.module().is_none());
}

#[test]
fn given_bound_device_when_same_key_resolved_then_data_handler_called() {
    // GIVEN: A bound module with a data handler
    let log = call_log();
    let module = ScriptedModule::new("hamster", &log).with_capabilities(Capabilities {
        data_handler: true,
        ..Capabilities::default()
    });
    let mut resolver = DeviceResolver::new(DeviceRegistry::new().with_module("a.1", Arc::new(module)));
    let identify = record(json!({"company": 10, "model": 1}));
    assert_eq!(
        resolver.resolve(&identify, None),
        Resolution::Bound(DeviceKey::new(10, 1))
    );

    // WHEN: The same device reports again
    let resolution = resolver.resolve(&identify, None);

    // THEN: No rebind, the handler saw the record
    assert_eq!(resolution, Resolution::SameDevice);
    assert_eq!(calls(&log), vec!["hamster.data_handler"]);
}

#[test]
fn given_module_without_data_handler_when_same_key_resolved_then_not_called() {
    // GIVEN: A bound module that does not declare the handler
    let log = call_log();
    let mut resolver = DeviceResolver::new(
        DeviceRegistry::new().with_module("a.1", Arc::new(ScriptedModule::new("hamster", &log))),
    );
    let identify = record(json!({"company": 10, "model": 1}));
    resolver.resolve(&identify, None);

    // WHEN/THEN
    assert_eq!(resolver.resolve(&identify, None), Resolution::SameDevice);
    assert!(calls(&log).is_empty());
}

/// **VALUE**: The monitor view is created once and reused across devices.
///
/// **WHY THIS MATTERS**: The host panel owns one monitor. Switching boards
/// must rebind and reinitialize that view, not stack a second one.
///
/// **BUG THIS CATCHES**: Would catch `create_view` being called on every
/// bind, or `add_mode` being skipped on a rebind.
#[test]
fn given_two_devices_with_templates_when_bound_in_turn_then_view_created_then_rebound() {
    // GIVEN: Two modules with general-view templates and a panel
    let log = call_log();
    let registry = DeviceRegistry::new()
        .with_module(
            "a.1",
            Arc::new(ScriptedModule::new("hamster", &log).with_template(template(DisplayMode::General))),
        )
        .with_module(
            "a.2",
            Arc::new(ScriptedModule::new("turtle", &log).with_template(template(DisplayMode::General))),
        );
    let mut resolver = DeviceResolver::new(registry);
    let mut panel = panel(&log);

    // WHEN: Binding the first, then the second device
    resolver.resolve(
        &record(json!({"company": 10, "model": 1})),
        Some(&mut panel as &mut dyn MonitorPanel),
    );
    resolver.resolve(
        &record(json!({"company": 10, "model": 2})),
        Some(&mut panel as &mut dyn MonitorPanel),
    );

    // THEN: One creation, then a rebind of the same view
    assert_eq!(
        calls(&log),
        vec![
            "panel.create_view:hamster",
            "panel.add_mode",
            "view.general",
            "view.rebind:turtle",
            "view.init_view",
            "panel.add_mode",
            "view.general",
        ]
    );
    assert!(resolver.has_monitor());
}

#[test]
fn given_both_display_mode_when_bound_then_list_rendered_before_general() {
    // GIVEN: A module that wants both views
    let log = call_log();
    let registry = DeviceRegistry::new().with_module(
        "a.1",
        Arc::new(ScriptedModule::new("hamster", &log).with_template(template(DisplayMode::Both))),
    );
    let mut resolver = DeviceResolver::new(registry);
    let mut panel = panel(&log);

    // WHEN: Binding
    resolver.resolve(
        &record(json!({"company": 10, "model": 1})),
        Some(&mut panel as &mut dyn MonitorPanel),
    );

    // THEN
    assert_eq!(
        calls(&log),
        vec!["panel.create_view:hamster", "panel.add_mode", "view.list", "view.general"]
    );
}

#[test]
fn given_module_without_template_when_bound_then_panel_untouched() {
    // GIVEN: No template
    let log = call_log();
    let registry =
        DeviceRegistry::new().with_module("a.1", Arc::new(ScriptedModule::new("hamster", &log)));
    let mut resolver = DeviceResolver::new(registry);
    let mut panel = panel(&log);

    // WHEN
    let resolution = resolver.resolve(
        &record(json!({"company": 10, "model": 1})),
        Some(&mut panel as &mut dyn MonitorPanel),
    );

    // THEN: Bound without a monitor
    assert_eq!(resolution, Resolution::Bound(DeviceKey::new(10, 1)));
    assert!(!resolver.has_monitor());
    assert!(calls(&log).is_empty());
}

#[test]
fn given_bound_device_with_monitor_when_unbound_then_mode_removed_and_view_kept() {
    // GIVEN: A bound device with a monitor
    let log = call_log();
    let registry = DeviceRegistry::new().with_module(
        "a.1",
        Arc::new(ScriptedModule::new("hamster", &log).with_template(template(DisplayMode::List))),
    );
    let mut resolver = DeviceResolver::new(registry);
    let mut panel = panel(&log);
    resolver.resolve(
        &record(json!({"company": 10, "model": 1})),
        Some(&mut panel as &mut dyn MonitorPanel),
    );

    // WHEN: Unbinding
    resolver.unbind(Some(&mut panel as &mut dyn MonitorPanel));

    // THEN: Selection cleared, mode removed, view retained for later
    assert!(resolver.selected().is_none());
    assert!(resolver.module().is_none());
    assert!(resolver.has_monitor());
    assert_eq!(calls(&log).last().map(String::as_str), Some("panel.remove_mode"));
}
