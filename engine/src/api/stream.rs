//! WebSocket event stream.
//!
//! Forwards the engine's task events to connected observers, one JSON
//! text frame per event.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use tracing::{debug, info};

use crate::engine::BatchEngine;
use crate::events::EventReceiver;

/// GET /api/v1/events
///
/// Upgrades the connection and streams task events until the client
/// disconnects or the engine shuts down.
pub async fn event_stream(ws: WebSocketUpgrade, State(engine): State<BatchEngine>) -> Response {
    info!("Event stream subscriber connecting");
    let receiver = engine.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, receiver))
}

async fn forward_events(mut socket: WebSocket, mut receiver: EventReceiver) {
    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Ok(event) = event else {
                    debug!("Event channel closed, ending stream");
                    break;
                };
                let Ok(payload) = event.to_json() else {
                    continue;
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    debug!("Event stream client went away");
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        debug!("Event stream closed by client");
                        break;
                    }
                    // Pings are answered by axum; other frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
