//! Rust client library for the iFlytek (XFYun) Text-to-Speech and speech
//! recognition WebSocket APIs.
//!
//! Every call opens one signed WebSocket [`Connection`], exchanges JSON frames
//! and closes it again. [`Client::tts`] and [`Client::iat`] wrap the two
//! supported request shapes; [`Client::connect`] gives access to the raw
//! connection for anything else.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use rust_xfyun::{Client, ClientConfig, TtsRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rust_xfyun::Error> {
//!     let client = Client::from_config(ClientConfig::from_env()?);
//!
//!     let mut request = TtsRequest::new("你好, 你好, 你们好", "lame", "xiaoyan");
//!     request.sfl = Some(1);
//!
//!     let mut audio = std::pin::pin!(client.tts(request));
//!     while let Some(chunk) = audio.next().await {
//!         println!("Received audio chunk: {} bytes", chunk?.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Diagnostics are emitted through `tracing`; install a subscriber to see
//! them.

mod auth;
mod client;
mod config;
mod connection;
mod error;
pub mod iat;
mod messages;
mod response;
pub mod transport;
pub mod tts;
mod upload;
pub mod ws;

pub use auth::{rfc1123, sign, Credentials, SignedUrl};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT};
pub use connection::Connection;
pub use error::Error;
pub use iat::{
    IatBusiness, IatDomain, IatEndpoint, IatRequest, IatResponse, IatResult, Transcript,
    IAT_HOST, IAT_NICHE_HOST, IAT_PATH,
};
pub use messages::*;
pub use response::Responses;
pub use transport::{Connector, ReadyState, Transport, TransportEvent};
pub use tts::{TextEncoding, TtsBusiness, TtsRequest, TTS_HOST, TTS_PATH};
pub use upload::{audio_chunks, UploadStats, Uploader, DEFAULT_CHUNK_SIZE, DEFAULT_UPLOAD_INTERVAL};
pub use ws::{WebSocket, WsConnector};
