//! Gateway event tail
//!
//! Connects with the token from the environment and logs every event.
//! Run with:
//! ```bash
//! KOOK_TOKEN=... cargo run -p kook-gateway --bin kook-tail
//! ```

use kook_common::{try_init_tracing, ClientConfig};
use kook_gateway::{ClientEvent, KookClient};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    info!(
        rest = %config.rest.base_url,
        message_cache_size = config.cache.message_cache_size,
        "Configuration loaded"
    );

    let client = KookClient::new(config)?;
    let mut events = client.subscribe("tail");
    client.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            event = events.recv() => match event {
                Some(ClientEvent::FatalError(reason)) => {
                    error!(reason = %reason, "Session stopped");
                    break;
                }
                Some(event) => info!(event = event.name(), "Event"),
                None => break,
            },
        }
    }

    client.stop().await?;
    info!(stats = ?client.cache().stats(), "Stopped");
    Ok(())
}
