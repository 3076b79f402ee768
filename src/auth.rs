//! Credentials and signed connection URLs.
//!
//! Every connection attempt needs a freshly signed URL: the RFC 1123 date is
//! part of the signed material and the server rejects stale dates.

use std::fmt;

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "hmac-sha256";
const SIGNED_HEADERS: &str = "host date request-line";

/// Application credentials issued by the XFYun console.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application id, sent in the `common` block of every frame.
    pub app_id: String,
    /// API key, embedded in the authorization descriptor.
    pub api_key: String,
    /// API secret, used as the HMAC key.
    pub api_secret: String,
}

impl Credentials {
    /// Creates a new set of credentials.
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Signs `host` and `path` at the given instant.
    pub fn sign(&self, host: &str, path: &str, now: DateTime<Utc>) -> SignedUrl {
        sign(self, host, path, now)
    }

    /// Signs `host` and `path` with the current wall-clock time.
    pub fn sign_now(&self, host: &str, path: &str) -> SignedUrl {
        sign(self, host, path, Utc::now())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// A signed `wss://` connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    /// Target host.
    pub host: String,
    /// Request path.
    pub path: String,
    /// RFC 1123 date that was signed.
    pub date: String,
    /// Base64 authorization descriptor.
    pub authorization: String,
}

impl SignedUrl {
    /// Renders the URL with form-encoded query parameters.
    pub fn to_url(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("host", &self.host)
            .append_pair("date", &self.date)
            .append_pair("authorization", &self.authorization)
            .finish();
        format!("wss://{}{}?{}", self.host, self.path, query)
    }

    /// Same URL with the authorization value elided, for logging.
    pub fn redacted(&self) -> String {
        format!("wss://{}{}?host={}&date={}", self.host, self.path, self.host, self.date)
    }
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// Formats a timestamp as an RFC 1123 HTTP date.
pub fn rfc1123(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Builds the signed URL for `host` and `path` at `now`.
pub fn sign(credentials: &Credentials, host: &str, path: &str, now: DateTime<Utc>) -> SignedUrl {
    let date = rfc1123(now);
    let signature = signature(&credentials.api_secret, host, path, &date);
    let descriptor = format!(
        r#"api_key="{}",algorithm="{}",headers="{}",signature="{}""#,
        credentials.api_key, ALGORITHM, SIGNED_HEADERS, signature
    );
    let authorization = base64::engine::general_purpose::STANDARD.encode(descriptor);

    SignedUrl {
        host: host.to_string(),
        path: path.to_string(),
        date,
        authorization,
    }
}

fn signature(secret: &str, host: &str, path: &str, date: &str) -> String {
    let origin = format!("host: {host}\ndate: {date}\nGET {path} HTTP/1.1");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(origin.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
