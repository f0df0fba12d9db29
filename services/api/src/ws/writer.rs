//! Outbound frame writer.
//!
//! Sessions and their generation tasks never touch the socket directly. They
//! push [`ServerFrame`]s into a channel drained by a single forwarding task,
//! which keeps frames in order and lets a keep-alive echo go out while a reply
//! is still streaming.

use super::protocol::{EndOfCall, ServerFrame};
use anyhow::{Result, anyhow};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};
use interview_core::history::HistoryBuffer;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Cloneable handle used to emit frames for one call.
#[derive(Clone, Debug)]
pub struct FrameWriter {
    tx: mpsc::Sender<ServerFrame>,
}

impl FrameWriter {
    pub fn new(tx: mpsc::Sender<ServerFrame>) -> Self {
        Self { tx }
    }

    /// Creates a writer together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, frame: ServerFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| anyhow!("outbound frame channel closed"))
    }

    pub async fn config(&self) -> Result<()> {
        self.send(ServerFrame::config()).await
    }

    pub async fn pong(&self, timestamp: Option<u64>) -> Result<()> {
        self.send(ServerFrame::pong(timestamp)).await
    }

    pub async fn chunk(&self, response_id: u64, content: impl Into<String>) -> Result<()> {
        self.send(ServerFrame::chunk(response_id, content)).await
    }

    /// Marks the end of a streamed reply.
    pub async fn finish(&self, response_id: u64) -> Result<()> {
        self.send(ServerFrame::complete(response_id, "", None)).await
    }

    /// Sends a whole reply in one frame and records it as an assistant turn,
    /// so the model sees everything that was spoken on its next invocation.
    pub async fn speak(
        &self,
        history: &mut HistoryBuffer,
        response_id: u64,
        text: &str,
        end_of_call: Option<EndOfCall>,
    ) -> Result<()> {
        history.push_assistant(text);
        self.send(ServerFrame::complete(response_id, text, end_of_call))
            .await
    }
}

/// Drains frames from the channel and writes them to the socket as JSON text.
pub async fn forward_frames(
    mut rx: mpsc::Receiver<ServerFrame>,
    mut socket_tx: SplitSink<WebSocket, Message>,
) {
    while let Some(frame) = rx.recv().await {
        let serialized = match serde_json::to_string(&frame) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound frame");
                continue;
            }
        };
        if let Err(e) = socket_tx.send(Message::Text(serialized.into())).await {
            debug!(error = %e, "Socket closed while forwarding frames");
            break;
        }
    }
    if let Err(e) = socket_tx.close().await {
        debug!(error = %e, "Socket already closed when shutting down forwarder");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::EndReason;
    use interview_core::history::Role;

    #[tokio::test]
    async fn test_speak_records_assistant_turn_and_sends_complete_frame() {
        let (writer, mut rx) = FrameWriter::channel(8);
        let mut history = HistoryBuffer::new(10);
        history.set_system("sys");

        writer
            .speak(
                &mut history,
                5,
                "Goodbye",
                Some(EndOfCall::after_spoken(EndReason::MaxDuration)),
            )
            .await
            .unwrap();

        let last = history.turns().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text, "Goodbye");

        let frame = rx.recv().await.unwrap();
        let response = frame.as_response().unwrap();
        assert_eq!(response.response_id, 5);
        assert!(response.content_complete);
        assert!(response.end_call);
    }

    #[tokio::test]
    async fn test_send_fails_once_receiver_dropped() {
        let (writer, rx) = FrameWriter::channel(1);
        drop(rx);
        assert!(writer.pong(Some(1)).await.is_err());
    }
}
