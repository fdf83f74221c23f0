//! The hardware session.
//!
//! # Architecture
//!
//! Uses an actor: one task owns the `SessionCore` and
//! the transport pool, and serializes everything that can change them:
//! - transport events, from the candidate tasks
//! - host commands, sent through a [`SessionHandle`]
//! - launcher reports
//! - the scheduled pool reopen
//! - the update-pump tick
//!
//! Reads of the current status go through an `Arc<RwLock<SessionStatus>>`
//! that the actor refreshes after every step.

pub(crate) mod actor;
mod events;
mod handle;
mod machine;
mod state;

pub use events::{DownloadKind, Notice, NoticeLevel, SessionEvent};
pub use handle::{SessionBuilder, SessionHandle};
pub use state::{ConnectionState, SessionStatus};

pub(crate) use machine::SessionCore;

/// The host's editing workspace.
pub trait WorkspaceHook: Send + Sync {
    /// Called when the session becomes connected.
    fn refresh_hardware_menu(&self);

    fn ban_block_class(&self, class_name: &str);
}
