//! Live view updates over WebSocket.
//!
//! Every client gets the current view on connect and then one
//! `backups:updated` message per publish.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::model::AggregateView;

pub const UPDATED_EVENT: &str = "backups:updated";

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

pub fn update_message(view: &AggregateView) -> String {
    json!({
        "type": UPDATED_EVENT,
        "payload": view,
    })
    .to_string()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut views = state.guardian.poller().subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            let latest = views.borrow_and_update().clone();
            if let Some(view) = latest {
                if sender.send(Message::Text(update_message(&view).into())).await.is_err() {
                    break;
                }
            }
            if views.changed().await.is_err() {
                break;
            }
        }
    });

    // Clients only listen; drain until they close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!("WebSocket client disconnected");
}
