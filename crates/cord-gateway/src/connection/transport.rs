//! WebSocket transport
//!
//! Connects to the gateway and splits the socket into an inbound frame stream
//! and an outbound queue drained by a writer task.

use super::TransportError;
use crate::codec::{encode_message, RawFrame};
use crate::protocol::GatewayMessage;
use cord_common::Encoding;
use futures::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// What the transport yields to the connection loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Frame(RawFrame),
    /// The peer closed the socket, with its close code if it sent one
    Close(Option<u16>),
}

/// Inbound half of a connected transport
pub type InboundStream = BoxStream<'static, Result<Inbound, TransportError>>;

/// A connected socket
pub struct Transport {
    pub inbound: InboundStream,
    pub outbound: mpsc::Sender<GatewayMessage>,
    pub writer: JoinHandle<()>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("outbound_capacity", &self.outbound.capacity())
            .finish()
    }
}

impl Transport {
    /// Open a connection to `url`
    ///
    /// Outbound messages are encoded with `encoding`; at most `buffer` of them
    /// wait in the queue.
    pub async fn connect(url: &str, encoding: Encoding, buffer: usize) -> Result<Self, TransportError> {
        let (socket, _response) = connect_async(url).await?;
        tracing::debug!(url, "WebSocket connected");

        let (mut sink, stream) = socket.split();
        let (outbound, mut rx) = mpsc::channel::<GatewayMessage>(buffer.max(1));

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let frame = match encode_message(&message, encoding) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(op = %message.op, error = %e, "Failed to encode outbound message");
                        continue;
                    }
                };

                tracing::trace!(op = %message.op, "Sending frame");
                if let Err(e) = sink.send(to_ws_message(frame)).await {
                    tracing::warn!(error = %e, "Failed to send frame");
                    break;
                }
            }

            // Close the socket once every sender is gone
            let _ = sink.close().await;
        });

        let inbound = stream
            .filter_map(|message| async move { from_ws_message(message).transpose() })
            .boxed();

        Ok(Self {
            inbound,
            outbound,
            writer,
        })
    }
}

fn to_ws_message(frame: RawFrame) -> Message {
    match frame {
        RawFrame::Text(text) => Message::Text(text),
        RawFrame::Binary(bytes) => Message::Binary(bytes),
    }
}

/// Map a socket message; control frames yield nothing
fn from_ws_message(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Result<Option<Inbound>, TransportError> {
    match message? {
        Message::Text(text) => Ok(Some(Inbound::Frame(RawFrame::Text(text)))),
        Message::Binary(bytes) => Ok(Some(Inbound::Frame(RawFrame::Binary(bytes)))),
        Message::Close(frame) => Ok(Some(Inbound::Close(frame.map(|f| u16::from(f.code))))),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
    }
}
