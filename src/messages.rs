//! Frame types for the XFYun WebSocket protocol.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ============================================================================
// Common
// ============================================================================

/// The `data.status` sentinel carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    /// First frame, more to come.
    First = 0,
    /// Intermediate frame.
    Continue = 1,
    /// Final frame of the exchange.
    Last = 2,
}

impl Status {
    /// Returns true for the final frame of an exchange.
    pub fn is_last(self) -> bool {
        self == Status::Last
    }
}

impl TryFrom<u8> for Status {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::First),
            1 => Ok(Status::Continue),
            2 => Ok(Status::Last),
            other => Err(format!("invalid status {other}")),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// A request as supplied by the caller: optional business configuration plus
/// call data. The connection adds the `common` block when it is sent.
#[derive(Debug, Clone, Serialize)]
pub struct Request<B, D> {
    /// Call-specific configuration, only present on the first frame of a call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<B>,
    /// Frame payload.
    pub data: D,
}

impl<D> Request<(), D> {
    /// A request carrying only data.
    pub fn data(data: D) -> Self {
        Self {
            business: None,
            data,
        }
    }
}

impl<B, D> Request<B, D> {
    /// A request carrying business configuration and data.
    pub fn with_business(business: B, data: D) -> Self {
        Self {
            business: Some(business),
            data,
        }
    }
}

/// The `common` block of every outbound frame.
#[derive(Debug, Clone, Serialize)]
pub struct Common<'a> {
    /// Application id.
    pub app_id: &'a str,
}

/// The full outbound frame: `{ common, business?, data }`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame<'a, B, D> {
    /// Application block.
    pub common: Common<'a>,
    /// Business configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<&'a B>,
    /// Frame payload.
    pub data: &'a D,
}

impl<'a, B, D> RequestFrame<'a, B, D> {
    /// Wraps a caller request with the application id.
    pub fn new(app_id: &'a str, request: &'a Request<B, D>) -> Self {
        Self {
            common: Common { app_id },
            business: request.business.as_ref(),
            data: &request.data,
        }
    }
}

/// Text payload of a synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    /// Base64-encoded text.
    pub text: String,
    /// Always [`Status::Last`]: the whole text is one chunk.
    pub status: Status,
}

/// Audio payload of a recognition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioData {
    /// Position of this frame in the upload.
    pub status: Status,
    /// Audio format, e.g. `audio/L16;rate=16000`.
    pub format: String,
    /// Audio encoding, e.g. `raw`.
    pub encoding: String,
    /// Base64-encoded audio, empty on the final frame.
    pub audio: String,
}

// ============================================================================
// Inbound
// ============================================================================

/// Payload of a response frame: the status sentinel plus call-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Status sentinel.
    pub status: Status,
    /// Remaining call-specific fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// A decoded inbound frame: `{ code, message, data, sid? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// 0 on success, otherwise a server error code.
    pub code: i64,
    /// Human readable reason for `code`.
    #[serde(default)]
    pub message: String,
    /// Frame payload; error frames may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    /// Session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl ResponseFrame {
    /// Decodes a raw text message.
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::MalformedFrame(e.to_string()))
    }

    /// Status of this frame, if it carries data.
    pub fn status(&self) -> Option<Status> {
        self.data.as_ref().map(|d| d.status)
    }

    /// Returns true if this frame ends the exchange.
    pub fn is_last(&self) -> bool {
        self.status().is_some_and(Status::is_last)
    }

    /// Returns true if the server reported success.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Converts a frame with nonzero code into [`Error::Protocol`].
    pub fn check(self) -> Result<Self, Error> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::protocol(self))
        }
    }

    /// Reads a string field from the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.payload.get(key)?.as_str()
    }

    /// Decodes the whole `data` object into a typed payload.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| Error::MalformedFrame("frame has no data".to_string()))?;
        let value = serde_json::to_value(data)?;
        serde_json::from_value(value).map_err(|e| Error::MalformedFrame(e.to_string()))
    }
}
