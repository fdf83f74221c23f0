use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Session Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}
