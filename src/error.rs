//! Error types for the XFYun client library.

use thiserror::Error;

use crate::messages::ResponseFrame;

/// Error type for XFYun client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The WebSocket handshake failed or timed out.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// A frame was sent while the connection was not open.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The server answered with a nonzero `code`.
    #[error("Server error: {message} (code: {code})")]
    Protocol {
        /// Error code from server.
        code: i64,
        /// Error message from server.
        message: String,
        /// Session id, when the server assigned one.
        sid: Option<String>,
        /// The offending frame.
        frame: Box<ResponseFrame>,
    },

    /// An inbound message could not be decoded into a response frame.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The transport closed or failed before the final frame arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Another response sequence is already reading this connection.
    #[error("Response sequence already subscribed")]
    AlreadySubscribed,

    /// Missing or invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// WebSocket connection error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 payload could not be decoded.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Reading the audio source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::Protocol`] from a frame carrying a nonzero code.
    pub fn protocol(frame: ResponseFrame) -> Self {
        Self::Protocol {
            code: frame.code,
            message: frame.message.clone(),
            sid: frame.sid.clone(),
            frame: Box::new(frame),
        }
    }
}
