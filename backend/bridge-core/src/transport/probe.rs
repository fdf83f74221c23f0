use std::time::Duration;

use log::{debug, warn};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;

/// Dial the legacy bridge address with a raw websocket.
///
/// Returns `true` when the handshake completes, which means an outdated
/// bridge program is answering. Any failure (including the timeout) means
/// no legacy bridge.
pub async fn probe_legacy_bridge(url: &str, budget: Duration) -> bool {
    match timeout(budget, connect_async(url)).await {
        Ok(Ok((mut stream, _))) => {
            warn!("Legacy bridge answered at {url}");
            let _ = stream.close(None).await;
            true
        }
        Ok(Err(e)) => {
            debug!("Legacy bridge probe to {url} failed: {e}");
            false
        }
        Err(_) => {
            debug!("Legacy bridge probe to {url} timed out after {budget:?}");
            false
        }
    }
}
