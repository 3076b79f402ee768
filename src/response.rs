//! Lazily consumed sequence of response frames.
//!
//! A [`Responses`] is a small state machine over the connection's inbound
//! events: it stays `Listening` until it has yielded a frame with
//! `status == 2`, a terminal error, or the socket went away, and is `Done`
//! afterwards. It holds the connection's single inbound [`Subscription`] for
//! as long as it lives.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::Stream;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::Error;
use crate::messages::ResponseFrame;
use crate::transport::TransportEvent;

/// Inbound bookkeeping shared by a connection and its response sequences.
#[derive(Debug, Default)]
pub(crate) struct Inbound {
    subscribed: AtomicBool,
    finished: AtomicBool,
}

impl Inbound {
    /// Takes the inbound subscription.
    pub(crate) fn subscribe(&self) -> Result<Subscription<'_>, Error> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadySubscribed);
        }
        Ok(Subscription { inbound: self })
    }

    /// Returns true once a final frame has been observed.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Returns true while a response sequence is alive.
    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

/// Exclusive claim on a connection's inbound events, released on drop.
#[derive(Debug)]
pub(crate) struct Subscription<'a> {
    inbound: &'a Inbound,
}

impl Subscription<'_> {
    fn finish(&self) {
        self.inbound.finished.store(true, Ordering::SeqCst);
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.inbound.subscribed.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Listening,
    Done,
}

/// Finite, non-restartable sequence of [`ResponseFrame`]s read from a
/// [`Connection`].
pub struct Responses<'a> {
    conn: &'a Connection,
    state: State,
    subscription: Subscription<'a>,
}

impl<'a> Responses<'a> {
    pub(crate) fn new(conn: &'a Connection, subscription: Subscription<'a>) -> Self {
        let state = if subscription.inbound.is_finished() {
            State::Done
        } else {
            State::Listening
        };
        Self {
            conn,
            state,
            subscription,
        }
    }

    /// Returns true once the sequence has ended.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Waits for the next frame.
    ///
    /// Returns `None` after a frame with `status == 2` has been yielded. A
    /// transport close or error before that point is yielded once as
    /// [`Error::Transport`], after which the sequence is over.
    pub async fn next(&mut self) -> Option<Result<ResponseFrame, Error>> {
        if self.state == State::Done {
            return None;
        }

        let event = self.conn.transport().next_event().await;
        match event {
            TransportEvent::Message(text) => match ResponseFrame::parse(&text) {
                Ok(frame) => {
                    debug!(
                        conn_id = %self.conn.id(),
                        code = frame.code,
                        status = ?frame.status(),
                        "Response frame received"
                    );
                    if frame.is_last() {
                        self.state = State::Done;
                        self.subscription.finish();
                    }
                    Some(Ok(frame))
                }
                Err(e) => {
                    warn!(conn_id = %self.conn.id(), error = %e, "Undecodable response frame");
                    self.state = State::Done;
                    Some(Err(e))
                }
            },
            TransportEvent::Closed => {
                warn!(conn_id = %self.conn.id(), "Connection closed before final frame");
                self.state = State::Done;
                Some(Err(Error::Transport(
                    "connection closed before final frame".to_string(),
                )))
            }
            TransportEvent::Error(e) => {
                warn!(conn_id = %self.conn.id(), error = %e, "Connection failed before final frame");
                self.state = State::Done;
                Some(Err(Error::Transport(e)))
            }
        }
    }

    /// Like [`next`](Self::next), but frames with a nonzero `code` end the
    /// sequence with [`Error::Protocol`].
    pub async fn next_ok(&mut self) -> Option<Result<ResponseFrame, Error>> {
        match self.next().await? {
            Ok(frame) if !frame.is_ok() => {
                self.state = State::Done;
                Some(Err(Error::protocol(frame)))
            }
            other => Some(other),
        }
    }

    /// Adapts the sequence into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<ResponseFrame, Error>> + 'a {
        futures_util::stream::unfold(self, |mut responses| async move {
            let item = responses.next().await?;
            Some((item, responses))
        })
    }
}
