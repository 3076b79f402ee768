//! Text-to-Speech call.

use std::fmt;
use std::str::FromStr;

use async_stream::stream;
use base64::Engine;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::Error;
use crate::messages::{Request, ResponseFrame, Status, TextData};

/// Host of the synthesis endpoint.
pub const TTS_HOST: &str = "tts-api.xfyun.cn";

/// Path of the synthesis endpoint.
pub const TTS_PATH: &str = "/v2/tts";

/// Text encoding announced in `tte`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextEncoding {
    /// GB2312.
    Gb2312,
    /// GBK.
    Gbk,
    /// BIG5.
    Big5,
    /// UTF-16LE.
    Unicode,
    /// GB18030.
    Gb18030,
    /// UTF-8.
    #[default]
    Utf8,
}

/// How English text is read (`reg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnglish {
    /// Decided by the engine.
    Auto,
    /// Spelled letter by letter.
    Alphabet,
    /// Decided by the engine, falling back to spelling.
    AutoAlphabet,
}

impl ReadEnglish {
    const NAMES: [&'static str; 3] = ["auto", "alphabet", "auto-alphabet"];

    /// Wire index of this option.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for ReadEnglish {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::NAMES.iter().position(|name| *name == s) {
            Some(0) => Ok(ReadEnglish::Auto),
            Some(1) => Ok(ReadEnglish::Alphabet),
            Some(2) => Ok(ReadEnglish::AutoAlphabet),
            _ => Err(Error::Config(format!("unknown reg value {s:?}"))),
        }
    }
}

/// How digits are read (`rdn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadNumber {
    /// Decided by the engine.
    Auto,
    /// As a number value.
    Number,
    /// Digit by digit.
    String,
    /// Digit by digit unless clearly a value.
    StringFirst,
}

impl ReadNumber {
    const NAMES: [&'static str; 4] = ["auto", "number", "string", "string-first"];

    /// Wire index of this option.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for ReadNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::NAMES.iter().position(|name| *name == s) {
            Some(0) => Ok(ReadNumber::Auto),
            Some(1) => Ok(ReadNumber::Number),
            Some(2) => Ok(ReadNumber::String),
            Some(3) => Ok(ReadNumber::StringFirst),
            _ => Err(Error::Config(format!("unknown rdn value {s:?}"))),
        }
    }
}

/// A synthesis request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TtsRequest {
    /// Text to synthesize.
    pub text: String,
    /// Audio encoding, e.g. `raw` or `lame`.
    pub aue: String,
    /// Streamed mp3 flag, used with `aue = "lame"`.
    pub sfl: Option<u8>,
    /// Audio sample rate, e.g. `audio/L16;rate=16000`.
    pub auf: Option<String>,
    /// Voice name.
    pub vcn: String,
    /// Speed, 0-100.
    pub speed: Option<u32>,
    /// Volume, 0-100.
    pub volume: Option<u32>,
    /// Pitch, 0-100.
    pub pitch: Option<u32>,
    /// Background sound.
    pub bgs: Option<bool>,
    /// Text encoding, UTF-8 when unset.
    pub tte: Option<TextEncoding>,
    /// English reading mode by name (`auto`, `alphabet`, `auto-alphabet`).
    pub reg: Option<String>,
    /// Number reading mode by name (`auto`, `number`, `string`, `string-first`).
    pub rdn: Option<String>,
}

impl TtsRequest {
    /// Creates a request with the required fields.
    pub fn new(text: impl Into<String>, aue: impl Into<String>, vcn: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            aue: aue.into(),
            vcn: vcn.into(),
            ..Default::default()
        }
    }

    /// Business block sent with the request.
    pub fn business(&self) -> TtsBusiness {
        TtsBusiness {
            aue: self.aue.clone(),
            sfl: self.sfl,
            auf: self.auf.clone(),
            vcn: self.vcn.clone(),
            speed: self.speed,
            volume: self.volume,
            pitch: self.pitch,
            bgs: u8::from(self.bgs.unwrap_or(false)),
            tte: self.tte.unwrap_or_default(),
            reg: mapped_index::<ReadEnglish>(self.reg.as_deref(), ReadEnglish::index),
            rdn: mapped_index::<ReadNumber>(self.rdn.as_deref(), ReadNumber::index),
        }
    }

    /// Base64 of the text in the announced encoding.
    ///
    /// `UNICODE` is sent as UTF-16LE; every other encoding is sent as the
    /// UTF-8 bytes of the string.
    pub fn encoded_text(&self) -> String {
        let engine = base64::engine::general_purpose::STANDARD;
        match self.tte.unwrap_or_default() {
            TextEncoding::Unicode => {
                let bytes: Vec<u8> = self.text.encode_utf16().flat_map(u16::to_le_bytes).collect();
                engine.encode(bytes)
            }
            _ => engine.encode(self.text.as_bytes()),
        }
    }
}

/// Maps an option name to its index as a string, dropping unknown names.
fn mapped_index<T: FromStr>(name: Option<&str>, index: fn(T) -> usize) -> Option<String> {
    let name = name?;
    match name.parse::<T>() {
        Ok(value) => Some(index(value).to_string()),
        Err(_) => {
            warn!(value = %name, "Dropping unrecognized option");
            None
        }
    }
}

/// Business block of a synthesis request as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsBusiness {
    /// Audio encoding.
    pub aue: String,
    /// Streamed mp3 flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sfl: Option<u8>,
    /// Audio sample rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auf: Option<String>,
    /// Voice name.
    pub vcn: String,
    /// Speed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    /// Volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
    /// Pitch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<u32>,
    /// Background sound, 1 or 0.
    pub bgs: u8,
    /// Text encoding.
    pub tte: TextEncoding,
    /// English reading mode index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg: Option<String>,
    /// Number reading mode index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdn: Option<String>,
}

impl fmt::Display for TtsBusiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Decodes the audio carried by a synthesis response frame.
pub fn decode_audio(frame: &ResponseFrame) -> Result<Vec<u8>, Error> {
    let audio = frame
        .payload_str("audio")
        .ok_or_else(|| Error::MalformedFrame("synthesis frame has no audio".to_string()))?;
    Ok(base64::engine::general_purpose::STANDARD.decode(audio)?)
}

impl Client {
    /// Synthesizes `request`, yielding audio chunks as they arrive.
    ///
    /// The stream ends after the final frame and the connection is closed.
    /// A server error ends the stream with [`Error::Protocol`]; chunks already
    /// yielded stay valid.
    pub fn tts(&self, request: TtsRequest) -> impl Stream<Item = Result<Bytes, Error>> + Send + '_ {
        stream! {
            let conn = match self.open(TTS_HOST, TTS_PATH).await {
                Ok(conn) => conn,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let business = request.business();
            debug!(conn_id = %conn.id(), business = %business, "TTS request");
            let frame = Request::with_business(
                business,
                TextData {
                    text: request.encoded_text(),
                    status: Status::Last,
                },
            );

            let mut failure = conn.send(&frame).await.err();
            let mut total = 0usize;

            if failure.is_none() {
                match conn.responses() {
                    Ok(mut responses) => {
                        while let Some(item) = responses.next_ok().await {
                            match item.and_then(|frame| decode_audio(&frame)) {
                                Ok(audio) => {
                                    debug!(conn_id = %conn.id(), len = audio.len(), "TTS audio chunk");
                                    total += audio.len();
                                    if !audio.is_empty() {
                                        yield Ok(Bytes::from(audio));
                                    }
                                }
                                Err(e) => {
                                    failure = Some(e);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => failure = Some(e),
                }
            }

            if let Err(e) = conn.close().await {
                warn!(conn_id = %conn.id(), error = %e, "TTS close failed");
            }

            match failure {
                Some(e) => yield Err(e),
                None => info!(conn_id = %conn.id(), total_bytes = total, "TTS finished"),
            }
        }
    }

    /// Synthesizes `request` and returns the whole audio.
    pub async fn tts_bytes(&self, request: TtsRequest) -> Result<Vec<u8>, Error> {
        let mut audio = Vec::new();
        let mut chunks = std::pin::pin!(self.tts(request));
        while let Some(chunk) = chunks.next().await {
            audio.extend_from_slice(&chunk?);
        }
        Ok(audio)
    }
}
