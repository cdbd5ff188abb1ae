//! Idle-socket notification loop.
//!
//! The idle socket sits in a long poll; the server answers with
//! `changed: <subsystem>` lines when something happens. Each subsystem
//! maps to a re-fetch on the command socket, after which the `idle`
//! command is re-issued to keep the notification channel live. The
//! loop blocks on socket readability and exits only on connection loss
//! or shutdown cancellation.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::MpdEvent;
use crate::client::socket::{MpdSocket, SocketState};
use crate::client::MpdClient;

pub(crate) async fn run_idle_loop(
    client: MpdClient,
    mut socket: MpdSocket,
    shutdown: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("idle loop shutting down");
                return;
            }
            raw = socket.read_raw() => raw,
        };

        if socket.state() != SocketState::Connected {
            break;
        }
        if !raw.is_empty() {
            let data = String::from_utf8_lossy(&raw);
            dispatch_changes(&client, &data).await;
        }
        if socket.write_command(b"idle").await.is_err() {
            break;
        }
    }

    debug!("idle connection lost");
    client.on_connection_lost().await;
}

/// Interpret one idle reply and trigger the matching re-fetches.
async fn dispatch_changes(client: &MpdClient, data: &str) {
    let mut queue_refreshed = false;

    for line in data.lines() {
        let line = line.trim_end();
        if line.is_empty() || line == "OK" || line.starts_with("OK MPD ") {
            continue;
        }
        let Some(subsystem) = line.strip_prefix("changed: ") else {
            warn!("unknown line in idle return: {}", line);
            continue;
        };
        match subsystem {
            "database" => {
                let _ = client.get_stats().await;
                let _ = client.refresh_queue().await;
                queue_refreshed = true;
            }
            "update" => client.bus().publish(MpdEvent::DatabaseUpdated),
            "stored_playlist" => client.bus().publish(MpdEvent::StoredPlaylistsChanged),
            "playlist" => {
                if !queue_refreshed {
                    let _ = client.queue_changes().await;
                }
            }
            "player" | "mixer" | "options" => {
                let _ = client.get_status().await;
            }
            "output" => {
                let _ = client.outputs().await;
            }
            other => warn!("unknown idle subsystem: {}", other),
        }
    }
}
