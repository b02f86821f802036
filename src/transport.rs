//! Transport seam between the connection manager and the wire.
//!
//! [`Transport::connect`] performs one dial and hands back a
//! [`TransportLink`]: an outbound sender and an inbound receiver of raw
//! text frames. The WebSocket implementation pumps both sides with
//! dedicated tasks; closing is signalled by channel closure in either
//! direction, so dropping the outbound sender closes the socket and the
//! inbound receiver yielding `None` means the peer went away.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::error::ClientError;

pub type FrameSender = mpsc::UnboundedSender<String>;
pub type FrameReceiver = mpsc::UnboundedReceiver<String>;

/// Channel endpoints of one live connection.
pub struct TransportLink {
    /// Raw text frames to transmit, in order.
    pub outbound: FrameSender,
    /// Raw text frames as delivered by the peer, in order.
    pub inbound: FrameReceiver,
}

/// One-shot dialer for the realtime channel.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportLink, ClientError>;
}

/// Production transport backed by tokio-tungstenite.
#[derive(Debug, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<TransportLink, ClientError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        // Write pump: drains the outbound channel into the sink. Dropping
        // the sender ends the loop and closes the socket.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    tracing::warn!("websocket write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Read pump: forwards text frames until the peer closes or errors.
        // Transport errors are logged only; the resulting channel closure
        // is what the connection manager treats as authoritative.
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("server closed the connection");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("websocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
