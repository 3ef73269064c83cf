use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use ffbuilder_events::{EventBroadcaster, Subscription};
use futures::{SinkExt, StreamExt};

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered as an event observer and
/// served by two halves (sender task + receive loop).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let heartbeat = Duration::from_secs(state.config.ws_heartbeat_secs.max(1));
    ws.on_upgrade(move |socket| handle_socket(socket, state.broadcaster, heartbeat))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Subscribes to the broadcaster.
///   2. Spawns a sender task that forwards events and heartbeat pings.
///   3. Processes inbound messages on the current task.
///   4. Unsubscribes on disconnect.
async fn handle_socket(socket: WebSocket, broadcaster: Arc<EventBroadcaster>, heartbeat: Duration) {
    let Subscription {
        id: observer_id,
        mut receiver,
    } = broadcaster.subscribe().await;
    tracing::info!(observer_id, "WebSocket client connected");

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward events to the WebSocket sink, pinging when idle.
    let send_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(heartbeat);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                event = receiver.recv() => {
                    let Some(event) = event else {
                        // Broadcaster closed us (shutdown).
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(observer_id, error = %e, "Failed to serialize job event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        tracing::debug!(observer_id, "WebSocket sink closed");
                        break;
                    }
                }
                _ = interval.tick() => {
                    tracing::trace!(observer_id, "WebSocket heartbeat ping");
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        tracing::debug!(observer_id, "WebSocket sink closed");
                        break;
                    }
                }
            }
        }
    });

    // Receiver loop: clients only send control frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(observer_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(observer_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    broadcaster.unsubscribe(observer_id).await;
    send_task.abort();
    tracing::info!(observer_id, "WebSocket client disconnected");
}
