//! Entry point holding credentials and the transport connector.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::transport::Connector;
use crate::ws::WsConnector;

/// Client for the XFYun WebSocket APIs.
///
/// Every call opens its own [`Connection`] and closes it when done.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
}

impl Client {
    /// Creates a client with default settings.
    pub fn new(credentials: Credentials) -> Self {
        Self::from_config(ClientConfig::new(credentials))
    }

    /// Creates a client from a full configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            connector: Arc::new(WsConnector),
        }
    }

    /// Replaces the transport connector.
    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Application credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.config.credentials
    }

    /// Opens a connection to `host` and `path` with an explicit handshake
    /// timeout.
    pub async fn connect(
        &self,
        host: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<Connection, Error> {
        Connection::connect(
            self.connector.as_ref(),
            &self.config.credentials,
            host,
            path,
            timeout,
        )
        .await
    }

    /// Opens a connection using the configured handshake timeout.
    pub(crate) async fn open(&self, host: &str, path: &str) -> Result<Connection, Error> {
        self.connect(host, path, self.config.connect_timeout).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}
