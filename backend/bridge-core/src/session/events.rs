use serde::Serialize;

/// Which download the host should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    /// The bridge program installer.
    Connector,
    Manual,
    /// Firmware or driver sources for the board.
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-visible message. Rendering is up to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
        }
    }

    pub(crate) fn terminated() -> Self {
        Self::new(
            NoticeLevel::Error,
            "Hardware disconnected",
            "The connection to the hardware bridge was closed.",
        )
    }

    /// `monitored`: the port values are shown in the hardware monitor.
    pub(crate) fn device_connected(module: &str, monitored: bool) -> Self {
        let body = if monitored {
            format!("{module} is connected. Port values are shown in the hardware monitor.")
        } else {
            format!("{module} is connected.")
        };
        Self::new(NoticeLevel::Success, "Hardware connected", body)
    }

    pub(crate) fn legacy_bridge() -> Self {
        Self::new(
            NoticeLevel::Warning,
            "Bridge update required",
            "An outdated hardware bridge is running. Install the latest version.",
        )
    }

    pub(crate) fn unsupported_host(reason: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, "Cannot start the bridge", reason)
    }
}

/// Events the session raises for the host. Tags only, no reply expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionChanged,
    DownloadRequested(DownloadKind),
    /// The launch flow found no bridge program to start.
    InstallPromptRequested,
    Notice(Notice),
}
