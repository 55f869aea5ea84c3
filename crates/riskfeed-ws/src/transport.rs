//! The `FeedTransport` trait and its WebSocket implementation.
//!
//! A transport only knows how to open one connection; lifecycle, retries and
//! routing live in [`FeedClient`](crate::FeedClient).

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use riskfeed_core::FeedError;

/// An inbound notification from an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text message from the server.
    Text(String),
    /// A non-fatal transport error. A `Closed` frame follows if the
    /// connection did not survive it.
    Error(String),
    /// The connection is gone. Nothing is received after this.
    Closed,
}

/// One open connection, as a pair of channels.
///
/// Sending on `outbound` writes a text frame. Dropping `outbound` closes the
/// connection.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

/// Opens connections to an event server.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn FeedTransport>`.
#[async_trait]
pub trait FeedTransport: Send + Sync + 'static {
    /// Open a connection to `url`, resolving once it is ready to exchange frames.
    async fn open(&self, url: &str) -> Result<Connection, FeedError>;
}

/// [`FeedTransport`] over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl FeedTransport for WsTransport {
    async fn open(&self, url: &str) -> Result<Connection, FeedError> {
        info!(url = %url, "connecting via WebSocket");
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| FeedError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let url = url.to_string();
        tokio::spawn(async move {
            pump(ws_stream, out_rx, in_tx).await;
            debug!(url = %url, "WebSocket pump ended");
        });

        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Shuttle frames between the socket and the connection channels until
/// either side goes away.
async fn pump<S>(
    ws_stream: S,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    in_tx: mpsc::UnboundedSender<Frame>,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                match outbound {
                    // Client dropped the connection.
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    }
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            warn!(error = %e, "WS send error");
                            let _ = in_tx.send(Frame::Error(e.to_string()));
                            break;
                        }
                    }
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(Frame::Text(text.to_string())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary / pong
                    Some(Err(e)) => {
                        warn!(error = %e, "WS receive error");
                        let _ = in_tx.send(Frame::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    let _ = in_tx.send(Frame::Closed);
}
