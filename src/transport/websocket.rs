//! WebSocket transport built on `tokio-tungstenite`
//!
//! [`WebSocketConnector::connect`] spawns one Tokio task per connection. The
//! task performs the handshake, then multiplexes two directions with
//! `tokio::select!`:
//!
//! - outbound commands from [`WebSocketTransport`] (frames and close
//!   requests) are written to the socket;
//! - inbound socket messages are translated into [`TransportEvent`]s.
//!
//! Ping/pong is answered by tungstenite itself and binary frames are
//! ignored. Exactly one `Closed` event is emitted per connection.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::error::{ChatbotError, Result};
use crate::transport::{Connector, EventReceiver, Transport, TransportEvent, ABNORMAL_CLOSE_CODE};

/// Command sent from the transport handle to the connection task.
#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

/// Connector that opens real WebSocket connections.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new connector
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    /// Spawn the connection task and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    fn connect(&self, url: &Url) -> (Arc<dyn Transport>, EventReceiver) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let target = url.to_string();
        tokio::spawn(async move {
            run_connection(target, outbound_rx, event_tx).await;
        });

        let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport { outbound_tx });
        (transport, event_rx)
    }
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WebSocketTransport {
    outbound_tx: mpsc::UnboundedSender<Outbound>,
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: String) -> Result<()> {
        self.outbound_tx.send(Outbound::Frame(frame)).map_err(|_| {
            ChatbotError::Transport("WebSocket connection task has ended".to_string()).into()
        })
    }

    fn close(&self) {
        // The task may already be gone; nothing left to close then.
        let _ = self.outbound_tx.send(Outbound::Close);
    }
}

/// Drive one connection from handshake to close.
async fn run_connection(
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    tracing::info!("Connecting to WebSocket: {}", redact_token(&url));

    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::warn!("WebSocket handshake failed: {}", e);
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed {
                code: ABNORMAL_CLOSE_CODE,
                reason: String::new(),
            });
            return;
        }
    };

    if events.send(TransportEvent::Opened).is_err() {
        tracing::debug!("Event receiver dropped before open; abandoning connection");
        return;
    }

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut outbound_open = true;
    let mut close_sent = false;
    let mut close_frame: Option<(u16, String)> = None;

    loop {
        tokio::select! {
            command = outbound_rx.recv(), if outbound_open && !close_sent => {
                match command {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
                            tracing::warn!("WebSocket send failed: {}", e);
                            let _ = events.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    other => {
                        if other.is_none() {
                            outbound_open = false;
                        }
                        tracing::debug!("Sending WebSocket close frame");
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        if let Err(e) = ws_write.send(WsMessage::Close(Some(frame))).await {
                            tracing::debug!("Close frame not sent: {}", e);
                            break;
                        }
                        close_sent = true;
                    }
                }
            }
            message = ws_read.next() => {
                match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        if events.send(TransportEvent::Frame(text.as_str().to_string())).is_err() {
                            tracing::debug!("Event receiver dropped; closing connection");
                            let _ = ws_write.close().await;
                            return;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                            .unwrap_or((CloseCode::Status.into(), String::new()));
                        tracing::info!("WebSocket closed by peer (code={})", code);
                        close_frame = Some((code, reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if close_frame.is_none() {
                            tracing::warn!("WebSocket read error: {}", e);
                            let _ = events.send(TransportEvent::Error(e.to_string()));
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let (code, reason) = close_frame.unwrap_or((ABNORMAL_CLOSE_CODE, String::new()));
    let _ = events.send(TransportEvent::Closed { code, reason });
}

/// Hide the `token` query value when logging a stream URL.
fn redact_token(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.query_pairs().any(|(k, _)| k == "token") => {
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let value = if k == "token" {
                        "***".to_string()
                    } else {
                        v.into_owned()
                    };
                    (k.into_owned(), value)
                })
                .collect();
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
