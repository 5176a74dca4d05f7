use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn};

use crate::location::LOCATION_UPDATE_EVENT;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.location_events_tx.subscribe();

    state.metrics.live_subscribers.inc();
    info!("tracking view subscribed");

    let send_task = tokio::spawn(async move {
        while let Ok(update) = rx.recv().await {
            let payload = json!({
                "event": LOCATION_UPDATE_EVENT,
                "parcelId": update.parcel_id,
                "lat": update.lat,
                "lng": update.lng,
            });
            let text = match serde_json::to_string(&payload) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "failed to serialize location update for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.metrics.live_subscribers.dec();
    info!("tracking view disconnected");
}
