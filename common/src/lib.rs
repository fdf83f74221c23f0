//! Shared building blocks for the hardware bridge workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking shared by every crate
//! - **bridge-core**: session, transport and device logic
//! - **hwlink**: host binary wiring configuration, logging and a session
//!
//! Keeping location tracking here lets every error enum in the workspace
//! render the same `[file:line:column]` suffix.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
