use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::{relay::Frame, AppState};

/// GET /ws - live telemetry channel. Producers and viewers look the same here.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, remote_addr))
}

async fn handle_socket(socket: WebSocket, state: AppState, remote_addr: SocketAddr) {
    let subscription = match state.relay.connect().await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(%remote_addr, error = %err, "rejecting websocket; relay unavailable");
            return;
        }
    };
    let connection_id = subscription.id;
    let mut frames = subscription.frames;
    let (mut sender, mut receiver) = socket.split();

    info!(connection_id, %remote_addr, "websocket connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
        debug!(connection_id, "writer task finished");
    });

    while let Some(msg_result) = receiver.next().await {
        let msg = match msg_result {
            Ok(m) => m,
            Err(e) => {
                warn!(connection_id, error = %e, "websocket receive error");
                break;
            }
        };

        let payload: Frame = match msg {
            Message::Text(text) => text.into(),
            Message::Binary(data) => String::from_utf8_lossy(&data).into(),
            Message::Close(frame) => {
                debug!(
                    connection_id,
                    reason = ?frame.map(|f| f.reason.to_string()),
                    "client closed websocket"
                );
                break;
            }
            // Pings are answered by axum.
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if state.relay.publish(connection_id, payload).is_err() {
            warn!(connection_id, "relay stopped; dropping connection");
            break;
        }
    }

    let _ = state.relay.disconnect(connection_id);
    writer.abort();
    info!(connection_id, %remote_addr, "websocket disconnected");
}
