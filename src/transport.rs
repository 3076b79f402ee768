//! Transport capability used by [`Connection`](crate::Connection).
//!
//! The connection only needs a socket that can report its lifecycle state,
//! send text, yield inbound events and close. [`WebSocket`](crate::ws::WebSocket)
//! is the tokio-tungstenite implementation; tests plug in scripted transports.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::error::Error;

/// Lifecycle of a socket. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Frames may be sent.
    Open = 1,
    /// Close requested, waiting for the close event.
    Closing = 2,
    /// Socket is gone.
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyState::Connecting => "connecting",
            ReadyState::Open => "open",
            ReadyState::Closing => "closing",
            ReadyState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic holder for a [`ReadyState`] that refuses backward transitions.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in the given state.
    pub fn new(state: ReadyState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Current state.
    pub fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Moves to `next` unless the cell is already past it.
    ///
    /// Returns the state before the call.
    pub fn advance(&self, next: ReadyState) -> ReadyState {
        ReadyState::from_u8(self.0.fetch_max(next as u8, Ordering::SeqCst))
    }
}

/// Inbound event observed on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text message.
    Message(String),
    /// The socket closed.
    Closed,
    /// The socket failed.
    Error(String),
}

/// A connected socket.
///
/// Implementations must tolerate `send_text` and `next_event` being awaited
/// concurrently from different tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> ReadyState;

    /// Sends one text message.
    async fn send_text(&self, text: String) -> Result<(), Error>;

    /// Waits for the next inbound event. Returns [`TransportEvent::Closed`]
    /// forever once the socket is closed.
    async fn next_event(&self) -> TransportEvent;

    /// Requests a close and waits until the close completes.
    async fn close(&self) -> Result<(), Error>;
}

/// Opens transports for signed URLs.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the handshake against `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_never_moves_backward() {
        let cell = StateCell::new(ReadyState::Connecting);
        assert_eq!(cell.advance(ReadyState::Open), ReadyState::Connecting);
        assert_eq!(cell.advance(ReadyState::Closed), ReadyState::Open);
        assert_eq!(cell.advance(ReadyState::Closing), ReadyState::Closed);
        assert_eq!(cell.get(), ReadyState::Closed);
    }

    #[test]
    fn test_connecting_may_skip_to_closed() {
        let cell = StateCell::new(ReadyState::Connecting);
        cell.advance(ReadyState::Closed);
        assert_eq!(cell.get(), ReadyState::Closed);
    }
}
