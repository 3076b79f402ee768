//! Client configuration.

use std::time::Duration;

use crate::auth::Credentials;
use crate::error::Error;
use crate::upload::DEFAULT_UPLOAD_INTERVAL;

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variables read by [`ClientConfig::from_env`], each with its
/// lowercase fallback.
const APP_ID_VARS: [&str; 2] = ["XFYUN_APP_ID", "appid"];
const API_KEY_VARS: [&str; 2] = ["XFYUN_API_KEY", "apikey"];
const API_SECRET_VARS: [&str; 2] = ["XFYUN_API_SECRET", "apisecret"];

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application credentials.
    pub credentials: Credentials,
    /// Handshake timeout; `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Delay between recognition upload frames.
    pub upload_interval: Duration,
}

impl ClientConfig {
    /// Creates a configuration with default timeouts.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
        }
    }

    /// Reads credentials from the environment.
    ///
    /// Looks up `XFYUN_APP_ID`, `XFYUN_API_KEY` and `XFYUN_API_SECRET`,
    /// falling back to `appid`, `apikey` and `apisecret`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |names: [&str; 2]| {
            names
                .into_iter()
                .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
                .ok_or_else(|| Error::Config(format!("{} not set", names[0])))
        };

        let credentials = Credentials::new(
            read(APP_ID_VARS)?,
            read(API_KEY_VARS)?,
            read(API_SECRET_VARS)?,
        );
        Ok(Self::new(credentials))
    }

    /// Sets the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the delay between recognition upload frames.
    pub fn with_upload_interval(mut self, interval: Duration) -> Self {
        self.upload_interval = interval;
        self
    }
}
