pub mod config;
pub mod identity;
pub mod launch;
pub mod session;
pub mod transport;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Identity(#[from] identity::IdentityError),

    #[error(transparent)]
    Launch(#[from] launch::LaunchError),

    #[error(transparent)]
    Session(#[from] session::SessionError),

    #[error(transparent)]
    Transport(#[from] transport::TransportError),
}
