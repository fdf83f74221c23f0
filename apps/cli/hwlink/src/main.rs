use bridge_core::config::BridgeConfig;
use bridge_core::identity::{FileStore, KeyValueStore, MemoryStore, get_or_create_session_id};
use bridge_core::{SessionBuilder, SessionEvent};

use common::ErrorLocation;

use hwlink::env::{apply_overrides, detect_paths, load_dotenv};
use hwlink::error::HwlinkError;
use hwlink::host::{ConsoleWorkspace, describe_event, event_json, event_level};
use hwlink::logger;

use std::panic::Location;
use std::sync::Arc;

use log::{debug, error, info, log, warn};

#[tokio::main]
async fn main() -> Result<(), HwlinkError> {
    let dotenv_path = load_dotenv();
    let paths = detect_paths()?;
    logger::initialize(&paths.log_dir)?;

    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }
    info!(
        "Config dir {} ({})",
        paths.config_dir.display(),
        paths.source
    );

    let mut config = BridgeConfig::load(&paths.config_dir).unwrap_or_else(|e| {
        warn!("Using default bridge config: {e}");
        BridgeConfig::default()
    });
    apply_overrides(&mut config);

    let store: Box<dyn KeyValueStore> = match FileStore::in_data_dir() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("Session id will not persist: {e}");
            Box::new(MemoryStore::new())
        }
    };
    let session_id = get_or_create_session_id(store.as_ref());
    info!("Session {session_id}");

    let (session, mut events) = SessionBuilder::new(config, session_id)
        .with_workspace(Arc::new(ConsoleWorkspace))
        .spawn();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Session ended");
                    break;
                };
                debug!("{}", event_json(&event));
                log!(event_level(&event), "{}", describe_event(&event));
                if event == SessionEvent::SessionChanged {
                    let status = session.status().await;
                    info!("State {:?}, device {:?}", status.state, status.device);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    session.shutdown().await.map_err(|e| HwlinkError::Core {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}
