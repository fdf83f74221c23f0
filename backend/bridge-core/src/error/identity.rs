use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum IdentityError {
    #[error("Store Read Error: {path}: {message} {location}")]
    Read {
        message: String,
        path: PathBuf,
        location: ErrorLocation,
    },

    #[error("Store Write Error: {path}: {message} {location}")]
    Write {
        message: String,
        path: PathBuf,
        location: ErrorLocation,
    },

    #[error("Store Location Error: {message} {location}")]
    Location {
        message: String,
        location: ErrorLocation,
    },
}
