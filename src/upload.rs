//! Paced upload of recognition audio.

use std::io;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::Error;
use crate::messages::{AudioData, Request, Status};

/// Delay between two consecutive upload frames.
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_millis(40);

/// 40ms of 16kHz, 16-bit mono PCM.
pub const DEFAULT_CHUNK_SIZE: usize = 1280;

/// Turns an async reader into a stream of audio chunks of at most
/// `chunk_size` bytes.
pub fn audio_chunks<R>(reader: R, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>>
where
    R: AsyncRead,
{
    ReaderStream::with_capacity(reader, chunk_size.max(1))
}

/// Totals of a finished upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Frames sent, including the final empty one.
    pub frames: usize,
    /// Raw audio bytes sent.
    pub bytes: usize,
}

/// Frames audio chunks into recognition requests and sends them at a steady
/// pace.
///
/// The first frame carries `status = 0` and the business configuration, the
/// following ones `status = 1`, and a final empty frame with `status = 2`
/// marks the end of input.
#[derive(Debug, Clone)]
pub struct Uploader<B> {
    business: B,
    format: String,
    encoding: String,
    interval: Duration,
}

impl<B: Serialize> Uploader<B> {
    /// Creates an uploader with the default 40ms pacing.
    pub fn new(business: B, format: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            business,
            format: format.into(),
            encoding: encoding.into(),
            interval: DEFAULT_UPLOAD_INTERVAL,
        }
    }

    /// Overrides the delay between frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Delay between frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sends every chunk of `source`, then the end-of-input frame.
    ///
    /// Stops at the first send failure, e.g. [`Error::ConnectionClosed`] when
    /// the connection was closed underneath the upload.
    pub async fn run<S>(&self, conn: &Connection, source: S) -> Result<UploadStats, Error>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut source = std::pin::pin!(source);
        let mut status = Status::First;
        let mut stats = UploadStats::default();

        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            self.pace(stats.frames).await;

            let data = AudioData {
                status,
                format: self.format.clone(),
                encoding: self.encoding.clone(),
                audio: base64::engine::general_purpose::STANDARD.encode(&chunk),
            };
            self.send(conn, status, data).await?;

            stats.frames += 1;
            stats.bytes += chunk.len();
            status = Status::Continue;
        }

        self.pace(stats.frames).await;
        let last = AudioData {
            status: Status::Last,
            format: self.format.clone(),
            encoding: self.encoding.clone(),
            audio: String::new(),
        };
        self.send(conn, status, last).await?;
        stats.frames += 1;

        info!(conn_id = %conn.id(), frames = stats.frames, bytes = stats.bytes, "Upload finished");
        Ok(stats)
    }

    async fn pace(&self, sent: usize) {
        if sent > 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Sends `data`, attaching the business block while still on the first
    /// frame.
    async fn send(&self, conn: &Connection, status: Status, data: AudioData) -> Result<(), Error> {
        debug!(conn_id = %conn.id(), status = ?data.status, len = data.audio.len(), "Uploading frame");
        if status == Status::First {
            conn.send(&Request::with_business(&self.business, data)).await
        } else {
            conn.send(&Request::<&B, _> {
                business: None,
                data,
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_audio_chunks_sizes() {
        let audio: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
        let chunks: Vec<Bytes> = audio_chunks(&audio[..], 1280)
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert!(chunks.iter().all(|c| c.len() <= 1280 && !c.is_empty()));
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(joined, audio);
    }

    #[tokio::test]
    async fn test_audio_chunks_empty_reader() {
        let chunks: Vec<_> = audio_chunks(&[][..], 1280).collect().await;
        assert!(chunks.is_empty());
    }
}
