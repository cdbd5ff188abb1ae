//! mpd-control - headless event monitor
//!
//! Connects to the configured server and logs every engine event
//! until interrupted. Useful for watching a server live and as a
//! smoke test for a deployment.

use mpd_control::{bus, client, config};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpd_control=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting mpd-control monitor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::load_config()?;
    tracing::info!("Configuration loaded, endpoint: {}:{}", config.host, config.port);

    // Create event bus
    let bus = bus::create_bus();
    let mut events = bus.subscribe();

    // Construct the engine and adopt the configured details
    let client = client::MpdClient::new(bus.clone());
    let details = client::ConnectionDetails::from(&config);
    if client.configure(details).await {
        tracing::info!("Connected, protocol version {}", client.version().await);
        // Prime the consumers with the current server state
        let _ = client.get_status().await;
        let _ = client.get_stats().await;
        let _ = client.refresh_queue().await;
        let _ = client.outputs().await;
    } else {
        tracing::warn!("Not connected; will retry on the next command");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                client.disconnect_all().await;
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => tracing::info!(kind = event.event_type(), "event: {:?}", event),
                    Err(e) => {
                        tracing::warn!("event stream lagged: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}
