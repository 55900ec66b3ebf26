// WebSocket event stream: one subscriber per connection

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::broadcaster::Broadcaster;
use crate::registry::{SubscriberId, Subscription};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Leaves the registry on drop, however the connection ends.
struct SubscriptionGuard {
    broadcaster: Arc<Broadcaster>,
    id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.leave(self.id);
    }
}

pub(super) async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let broadcaster = state.broadcaster.clone();
    ws.on_upgrade(move |socket| async move {
        let subscription = broadcaster.join();
        let _guard = SubscriptionGuard {
            broadcaster: broadcaster.clone(),
            id: subscription.id,
        };
        if let Err(e) = stream_events(socket, subscription).await {
            tracing::info!("Event stream error: {}", e);
        }
    })
}

async fn stream_events(mut socket: WebSocket, subscription: Subscription) -> anyhow::Result<()> {
    let Subscription { id, mut events } = subscription;
    tracing::info!(subscriber = id, "Client connected to event stream");

    // No ping until one interval after connect.
    let mut ping_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + WS_PING_INTERVAL, WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let json = serde_json::to_string(&event)?;
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!(subscriber = id, "Client disconnected from event stream");
    Ok(())
}
