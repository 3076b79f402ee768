//! Integration tests against the live XFYun service.
//!
//! To run these tests, set XFYUN_APP_ID, XFYUN_API_KEY and XFYUN_API_SECRET.
//! The recognition test also needs a 16kHz PCM sample at the path in
//! XFYUN_IAT_SAMPLE (default `16k_10.pcm`).

use std::time::Duration;

use base64::Engine;
use futures_util::StreamExt;
use rust_xfyun::{
    audio_chunks, Client, ClientConfig, Connector, Error, IatBusiness, IatDomain, IatRequest,
    ReadyState, Request, Status, TextData, Transcript, TtsRequest, WsConnector, DEFAULT_CHUNK_SIZE,
    TTS_HOST, TTS_PATH,
};
use tracing::info;

const EXPECTED_TTS_BYTES: usize = 15984;
const REFERENCE_TRANSCRIPT: &str = "4月13日，中国台北选手戴资颖在比赛中发球，当日在新加坡室内体育场举行的新加坡羽毛球公开赛，女子单打半决赛中，中国台北选手戴资颖以2:1战胜日本选手山口茜，晋级决赛。";

fn get_config() -> Option<ClientConfig> {
    match ClientConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Skipping test: {e}");
            None
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn tts_request() -> TtsRequest {
    let mut request = TtsRequest::new("你好, 你好, 你们好", "lame", "xiaoyan");
    request.sfl = Some(1);
    request
}

#[tokio::test]
async fn test_raw_connection_tts() {
    let Some(config) = get_config() else { return };
    init_tracing();

    let client = Client::from_config(config);
    let conn = client
        .connect(TTS_HOST, TTS_PATH, Some(Duration::from_secs(10)))
        .await
        .expect("Failed to connect");

    let request = tts_request();
    conn.send(&Request::with_business(
        request.business(),
        TextData {
            text: request.encoded_text(),
            status: Status::Last,
        },
    ))
    .await
    .expect("Failed to send request");

    let mut byte_length = 0;
    let mut responses = conn.responses().expect("Failed to subscribe");
    while let Some(frame) = responses.next().await {
        let frame = frame.expect("Failed to read frame");
        assert_eq!(frame.code, 0, "server error: {}", frame.message);
        let audio = frame.payload_str("audio").unwrap_or_default();
        byte_length += base64::engine::general_purpose::STANDARD
            .decode(audio)
            .expect("audio should be valid base64")
            .len();
    }
    drop(responses);
    assert_eq!(byte_length, EXPECTED_TTS_BYTES);

    conn.close().await.expect("Failed to close");
    assert_eq!(conn.state(), ReadyState::Closed);
    conn.close().await.expect("Second close should be a no-op");
}

#[tokio::test]
async fn test_tts() {
    let Some(config) = get_config() else { return };
    init_tracing();

    let client = Client::from_config(config);
    let mut byte_length = 0;
    let mut chunks = std::pin::pin!(client.tts(tts_request()));
    while let Some(chunk) = chunks.next().await {
        byte_length += chunk.expect("TTS failed").len();
    }

    info!(byte_length, "TTS done");
    assert_eq!(byte_length, EXPECTED_TTS_BYTES);
}

#[tokio::test]
async fn test_iat() {
    let Some(config) = get_config() else { return };
    init_tracing();

    let sample = std::env::var("XFYUN_IAT_SAMPLE").unwrap_or_else(|_| "16k_10.pcm".to_string());
    let file = match tokio::fs::File::open(&sample).await {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Skipping test: cannot open {sample}: {e}");
            return;
        }
    };

    let mut business = IatBusiness::new("zh_cn", IatDomain::Iat, "mandarin");
    business.dwa = Some("wpgs".to_string());
    let request = IatRequest::new(business, "audio/L16;rate=16000", "raw");

    let client = Client::from_config(config);
    let mut transcript = Transcript::new();
    let mut responses = std::pin::pin!(client.iat(request, audio_chunks(file, DEFAULT_CHUNK_SIZE)));
    while let Some(response) = responses.next().await {
        let response = response.expect("IAT failed");
        info!(status = ?response.status, text = %response.text(), "IAT result");
        transcript.push_response(&response);
    }

    assert_eq!(transcript.text(), REFERENCE_TRANSCRIPT);
}

#[tokio::test]
async fn test_stale_date_is_rejected() {
    let Some(config) = get_config() else { return };
    init_tracing();

    let stale = chrono::Utc::now() - chrono::Duration::hours(1);
    let signed = config.credentials.sign(TTS_HOST, TTS_PATH, stale);

    let result = tokio::time::timeout(Duration::from_secs(15), WsConnector.open(&signed.to_url()))
        .await
        .expect("Handshake must not hang");
    assert!(
        matches!(result, Err(Error::HandshakeFailed(_))),
        "stale signature should be refused"
    );
}
