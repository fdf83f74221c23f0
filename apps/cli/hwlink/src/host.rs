//! Console stand-ins for the editor collaborators.

use bridge_core::{NoticeLevel, SessionEvent, WorkspaceHook};

use log::{Level, info};

/// Workspace without an editor: requests are only logged.
#[derive(Debug, Default)]
pub struct ConsoleWorkspace;

impl WorkspaceHook for ConsoleWorkspace {
    fn refresh_hardware_menu(&self) {
        info!("Hardware menu refresh requested");
    }

    fn ban_block_class(&self, class_name: &str) {
        info!("Block class {class_name} disabled");
    }
}

/// Log level a session event is reported at.
pub fn event_level(event: &SessionEvent) -> Level {
    match event {
        SessionEvent::SessionChanged => Level::Debug,
        SessionEvent::DownloadRequested(_) | SessionEvent::InstallPromptRequested => Level::Info,
        SessionEvent::Notice(notice) => match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => Level::Info,
            NoticeLevel::Warning => Level::Warn,
            NoticeLevel::Error => Level::Error,
        },
    }
}

/// One-line description of a session event.
pub fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::SessionChanged => "Session changed".to_string(),
        SessionEvent::DownloadRequested(kind) => format!("Download requested: {kind:?}"),
        SessionEvent::InstallPromptRequested => {
            "The hardware bridge is not installed; install it and retry".to_string()
        }
        SessionEvent::Notice(notice) => format!("{}: {}", notice.title, notice.body),
    }
}

/// Event as a JSON line for the debug log. Falls back to `Debug` output.
pub fn event_json(event: &SessionEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| format!("{event:?}"))
}
