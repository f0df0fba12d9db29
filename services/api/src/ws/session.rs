//! Manages the WebSocket connection lifecycle for one call.

use super::{
    dispatcher::Session,
    writer::{FrameWriter, forward_frames},
};
use crate::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{Stream, StreamExt, future, stream::SplitStream};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Frames queued for the socket before senders start waiting.
const OUTBOUND_BUFFER: usize = 64;

/// Axum handler to upgrade an HTTP connection to a per-call WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(call_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, call_id, state))
}

/// Runs one call from handshake to disconnect.
///
/// The socket is split: a forwarding task owns the sink and drains frames
/// from the session's writer, while the session consumes inbound text until
/// the platform closes the connection.
#[instrument(name = "llm_session", skip_all, fields(call_id = %call_id))]
async fn handle_socket(socket: WebSocket, call_id: String, state: Arc<AppState>) {
    info!("New LLM WebSocket connection");

    let (socket_tx, socket_rx) = socket.split();
    let (writer, frames_rx) = FrameWriter::channel(OUTBOUND_BUFFER);
    let forwarder = tokio::spawn(forward_frames(frames_rx, socket_tx));

    let mut session = Session::new(call_id, state, writer);
    if let Err(e) = session.open().await {
        error!(error = ?e, "Failed to send config handshake");
        forwarder.abort();
        return;
    }

    let outcome = session.run(text_frames(socket_rx)).await;

    if let Err(e) = forwarder.await {
        warn!(error = %e, "Frame forwarder ended abnormally");
    }
    info!(%outcome, "WebSocket connection closed");
}

/// Inbound text frames, ending at the first close frame or socket error.
fn text_frames(socket_rx: SplitStream<WebSocket>) -> impl Stream<Item = String> {
    socket_rx
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(text.to_string()),
                Ok(Message::Binary(_)) => {
                    warn!("Ignoring binary frame");
                    None
                }
                _ => None,
            }
        })
}
