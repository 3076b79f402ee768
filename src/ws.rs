//! WebSocket transport backed by tokio-tungstenite.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::transport::{Connector, ReadyState, StateCell, Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket connection wrapper.
///
/// The stream is split so that a sender and a reader can work concurrently;
/// each half sits behind its own mutex, which also keeps outbound frames in
/// call order.
pub struct WebSocket {
    write: Mutex<SplitSink<WsStream, Message>>,
    read: Mutex<SplitStream<WsStream>>,
    state: StateCell,
    closing: Mutex<()>,
}

impl WebSocket {
    /// Opens a new WebSocket connection to the given URL.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        debug!(host = %extract_host(url), "WebSocket connecting");

        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(handshake_error)?;

        info!(host = %extract_host(url), status = %response.status(), "WebSocket connected");

        let (write, read) = ws_stream.split();

        Ok(Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
            state: StateCell::new(ReadyState::Open),
            closing: Mutex::new(()),
        })
    }

    /// Sends a pong message.
    async fn send_pong(&self, data: Vec<u8>) {
        debug!("Sending pong");
        let mut writer = self.write.lock().await;
        if let Err(e) = writer.send(Message::Pong(data)).await {
            debug!(error = %e, "Failed to send pong");
        }
    }

    /// Reads frames until a text message or a terminal event arrives.
    async fn read_event(&self, reader: &mut SplitStream<WsStream>) -> TransportEvent {
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Message(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return TransportEvent::Message(text),
                    Err(e) => {
                        warn!(error = %e, "Invalid UTF-8 in binary message");
                        self.state.advance(ReadyState::Closed);
                        return TransportEvent::Error(format!("invalid UTF-8 in binary message: {e}"));
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    debug!("WebSocket received ping, sending pong");
                    self.send_pong(data).await;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "WebSocket received close");
                    self.state.advance(ReadyState::Closed);
                    return TransportEvent::Closed;
                }
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => {
                    self.state.advance(ReadyState::Closed);
                    return TransportEvent::Closed;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read failed");
                    self.state.advance(ReadyState::Closed);
                    return TransportEvent::Error(e.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocket {
    fn state(&self) -> ReadyState {
        self.state.get()
    }

    async fn send_text(&self, text: String) -> Result<(), Error> {
        let mut writer = self.write.lock().await;
        if self.state.get() != ReadyState::Open {
            return Err(Error::ConnectionClosed);
        }
        writer.send(Message::Text(text)).await.map_err(Error::WebSocket)
    }

    async fn next_event(&self) -> TransportEvent {
        if self.state.get() == ReadyState::Closed {
            return TransportEvent::Closed;
        }
        let mut reader = self.read.lock().await;
        self.read_event(&mut reader).await
    }

    async fn close(&self) -> Result<(), Error> {
        // Concurrent closers wait here and then see Closed.
        let _closing = self.closing.lock().await;
        if self.state.advance(ReadyState::Closing) == ReadyState::Closed {
            return Ok(());
        }

        debug!("WebSocket closing");
        {
            let mut writer = self.write.lock().await;
            match writer.send(Message::Close(None)).await {
                Ok(()) => {}
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    self.state.advance(ReadyState::Closed);
                    return Ok(());
                }
                Err(e) => {
                    self.state.advance(ReadyState::Closed);
                    return Err(Error::WebSocket(e));
                }
            }
        }

        // Wait for the peer to acknowledge; anything still in flight is dropped.
        let mut reader = self.read.lock().await;
        let drained = loop {
            match reader.next().await {
                Some(Ok(Message::Close(_)))
                | Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(Error::WebSocket(e)),
            }
        };
        self.state.advance(ReadyState::Closed);
        drop(reader);

        if let Err(e) = drained {
            warn!(error = %e, "WebSocket close failed");
            return Err(e);
        }

        let _ = self.write.lock().await.close().await;
        info!("WebSocket closed");
        Ok(())
    }
}

/// Opens [`WebSocket`] transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, Error> {
        let ws = WebSocket::connect(url).await?;
        Ok(Box::new(ws))
    }
}

fn handshake_error(e: tungstenite::Error) -> Error {
    match e {
        tungstenite::Error::Http(response) => {
            let body = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            Error::HandshakeFailed(format!("HTTP {}: {}", response.status(), body))
        }
        other => Error::HandshakeFailed(other.to_string()),
    }
}

fn extract_host(url: &str) -> &str {
    url.strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .and_then(|s| s.split(['/', '?']).next())
        .unwrap_or("localhost")
}
