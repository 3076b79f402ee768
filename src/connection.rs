//! One authenticated WebSocket connection.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::auth::Credentials;
use crate::error::Error;
use crate::messages::{Request, RequestFrame};
use crate::response::{Inbound, Responses};
use crate::transport::{Connector, ReadyState, Transport};

/// An open connection to an XFYun endpoint.
///
/// Created by [`Connection::connect`]; lives until [`close`](Self::close), a
/// server close, or a terminal transport error. Connections are never reused.
pub struct Connection {
    transport: Box<dyn Transport>,
    app_id: String,
    conn_id: String,
    inbound: Inbound,
}

impl Connection {
    /// Signs a URL for `host` and `path`, opens the transport and waits for
    /// the handshake to finish.
    ///
    /// With a `timeout`, a handshake that does not finish in time fails with
    /// [`Error::HandshakeFailed`] and the half-open socket is dropped.
    pub async fn connect(
        connector: &dyn Connector,
        credentials: &Credentials,
        host: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let conn_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let signed = credentials.sign_now(host, path);
        info!(conn_id = %conn_id, url = %signed.redacted(), "Connecting");

        let url = signed.to_url();
        let opened = match timeout {
            Some(limit) => match tokio::time::timeout(limit, connector.open(&url)).await {
                Ok(result) => result,
                Err(_) => Err(Error::HandshakeFailed(format!(
                    "timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => connector.open(&url).await,
        };

        let transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                error!(conn_id = %conn_id, url = %signed.redacted(), error = %e, "Failed to connect");
                return Err(match e {
                    Error::HandshakeFailed(_) => e,
                    other => Error::HandshakeFailed(other.to_string()),
                });
            }
        };

        info!(conn_id = %conn_id, "Connected");
        Ok(Self::from_transport(transport, &credentials.app_id, conn_id))
    }

    /// Wraps an already open transport.
    pub fn from_transport(
        transport: Box<dyn Transport>,
        app_id: impl Into<String>,
        conn_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            app_id: app_id.into(),
            conn_id: conn_id.into(),
            inbound: Inbound::default(),
        }
    }

    /// Short id used in log lines.
    pub fn id(&self) -> &str {
        &self.conn_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReadyState {
        self.transport.state()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Sends one request frame, adding the `common` block.
    ///
    /// Fails with [`Error::ConnectionClosed`] unless the connection is open;
    /// in that case nothing reaches the transport.
    pub async fn send<B, D>(&self, request: &Request<B, D>) -> Result<(), Error>
    where
        B: Serialize,
        D: Serialize,
    {
        if self.state() != ReadyState::Open {
            return Err(Error::ConnectionClosed);
        }
        let json = serde_json::to_string(&RequestFrame::new(&self.app_id, request))?;
        debug!(conn_id = %self.conn_id, len = json.len(), "Sending frame");
        self.transport.send_text(json).await
    }

    /// Starts reading response frames.
    ///
    /// Only one sequence may be alive at a time; the claim is released when
    /// the returned value is dropped. Once a final frame has been seen, new
    /// sequences are already exhausted.
    pub fn responses(&self) -> Result<Responses<'_>, Error> {
        let subscription = self.inbound.subscribe()?;
        Ok(Responses::new(self, subscription))
    }

    /// Returns true while a response sequence is reading this connection.
    pub fn is_subscribed(&self) -> bool {
        self.inbound.is_subscribed()
    }

    /// Closes the connection and waits for the close handshake.
    ///
    /// Closing an already closed connection succeeds without side effects.
    pub async fn close(&self) -> Result<(), Error> {
        if self.state() == ReadyState::Closed {
            return Ok(());
        }
        debug!(conn_id = %self.conn_id, "Closing");
        let result = self.transport.close().await;
        match &result {
            Ok(()) => info!(conn_id = %self.conn_id, "Closed"),
            Err(e) => error!(conn_id = %self.conn_id, error = %e, "Close failed"),
        }
        result
    }
}
