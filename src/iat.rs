//! Streaming speech recognition (IAT) call.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::Error;
use crate::messages::{ResponseFrame, Status};
use crate::upload::{UploadStats, Uploader};

/// Host of the general recognition endpoint.
pub const IAT_HOST: &str = "iat-api.xfyun.cn";

/// Host of the minority-language recognition endpoint.
pub const IAT_NICHE_HOST: &str = "iat-niche-api.xfyun.cn";

/// Path of both recognition endpoints.
pub const IAT_PATH: &str = "/v2/iat";

/// Which recognition endpoint to use.
///
/// Each variant connects to the host it is named after. Older XFYun client
/// code routed `niche` to `iat-api.xfyun.cn` and everything else to
/// `iat-niche-api.xfyun.cn`; that mapping is not followed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IatEndpoint {
    /// Chinese and English.
    #[default]
    Default,
    /// Minority languages.
    Niche,
}

impl IatEndpoint {
    /// Host serving this endpoint.
    pub fn host(self) -> &'static str {
        match self {
            IatEndpoint::Default => IAT_HOST,
            IatEndpoint::Niche => IAT_NICHE_HOST,
        }
    }
}

/// Recognition domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IatDomain {
    /// Daily language.
    #[default]
    #[serde(rename = "iat")]
    Iat,
    /// Medical.
    #[serde(rename = "medical")]
    Medical,
    /// Government seat assistant.
    #[serde(rename = "gov-seat-assistant")]
    GovSeatAssistant,
    /// Government analysis.
    #[serde(rename = "gov-ansys")]
    GovAnsys,
    /// Government navigation.
    #[serde(rename = "gov-nav")]
    GovNav,
    /// Finance navigation.
    #[serde(rename = "fin-nav")]
    FinNav,
    /// Finance analysis.
    #[serde(rename = "fin-ansys")]
    FinAnsys,
}

/// Vertical domain personalization (`pd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalDomain {
    /// Games.
    Game,
    /// Health.
    Health,
    /// Shopping.
    Shopping,
    /// Travel.
    Trip,
}

/// Business block of a recognition call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IatBusiness {
    /// Language, e.g. `zh_cn`.
    pub language: String,
    /// Recognition domain.
    pub domain: IatDomain,
    /// Accent, e.g. `mandarin`.
    pub accent: String,
    /// Trailing silence in ms that ends recognition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vad_eos: Option<u32>,
    /// `wpgs` enables dynamic correction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwa: Option<String>,
    /// Vertical domain personalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pd: Option<PersonalDomain>,
    /// Punctuation, 1 on and 0 off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptt: Option<u8>,
    /// Chinese script, `zh-cn` or `zh-hk`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rlang: Option<String>,
    /// Return VAD endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vinfo: Option<u8>,
    /// Normalize numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nunum: Option<u8>,
    /// Speex frame size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speex_size: Option<u32>,
    /// Number of sentence candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbest: Option<u32>,
    /// Number of word candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wbest: Option<u32>,
}

impl IatBusiness {
    /// Creates a business block with the required fields.
    pub fn new(language: impl Into<String>, domain: IatDomain, accent: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            domain,
            accent: accent.into(),
            ..Default::default()
        }
    }
}

/// A recognition request; the audio is passed separately to [`Client::iat`].
#[derive(Debug, Clone, PartialEq)]
pub struct IatRequest {
    /// Endpoint selection.
    pub endpoint: IatEndpoint,
    /// Business block sent with the first frame.
    pub business: IatBusiness,
    /// Audio format, e.g. `audio/L16;rate=16000`.
    pub format: String,
    /// Audio encoding, e.g. `raw`.
    pub encoding: String,
}

impl IatRequest {
    /// Creates a request for the default endpoint.
    pub fn new(business: IatBusiness, format: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            endpoint: IatEndpoint::Default,
            business,
            format: format.into(),
            encoding: encoding.into(),
        }
    }

    /// Selects the endpoint.
    pub fn with_endpoint(mut self, endpoint: IatEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}

/// A candidate word.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Candidate {
    /// Word text.
    pub w: String,
    /// Confidence score, when returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sc: Option<f64>,
}

/// A recognized word slot with its candidates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Word {
    /// Start offset in frames.
    #[serde(default)]
    pub bg: i64,
    /// Candidates, best first.
    #[serde(default)]
    pub cw: Vec<Candidate>,
}

/// Dynamic correction mode of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pgs {
    /// Append to the transcript.
    Apd,
    /// Replace the results in `rg`.
    Rpl,
}

/// A recognition result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IatResult {
    /// Sentence number.
    #[serde(default)]
    pub sn: u32,
    /// True on the last result.
    #[serde(default)]
    pub ls: bool,
    /// Start offset.
    #[serde(default)]
    pub bg: i64,
    /// End offset.
    #[serde(default)]
    pub ed: i64,
    /// Words.
    #[serde(default)]
    pub ws: Vec<Word>,
    /// Dynamic correction mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgs: Option<Pgs>,
    /// Range of sentence numbers replaced when `pgs` is `rpl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rg: Option<[u32; 2]>,
}

impl IatResult {
    /// Concatenation of the first candidate of every word.
    pub fn text(&self) -> String {
        self.ws
            .iter()
            .flat_map(|word| word.cw.first())
            .map(|cw| cw.w.as_str())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct IatData {
    status: Status,
    #[serde(default)]
    result: Option<IatResult>,
}

/// A decoded recognition response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct IatResponse {
    /// Server code, always 0 for frames yielded by [`Client::iat`].
    pub code: i64,
    /// Server message.
    pub message: String,
    /// Session id.
    pub sid: Option<String>,
    /// Status sentinel.
    pub status: Status,
    /// Recognition result, absent on some bookkeeping frames.
    pub result: Option<IatResult>,
}

impl IatResponse {
    /// Text of this frame's result.
    pub fn text(&self) -> String {
        self.result.as_ref().map(IatResult::text).unwrap_or_default()
    }
}

impl TryFrom<ResponseFrame> for IatResponse {
    type Error = Error;

    fn try_from(frame: ResponseFrame) -> Result<Self, Self::Error> {
        let data: IatData = frame.decode_data()?;
        Ok(Self {
            code: frame.code,
            message: frame.message,
            sid: frame.sid,
            status: data.status,
            result: data.result,
        })
    }
}

/// Accumulates results into a transcript, applying dynamic corrections.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    sentences: BTreeMap<u32, String>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one result.
    pub fn push(&mut self, result: &IatResult) {
        if let (Some(Pgs::Rpl), Some([from, to])) = (result.pgs, result.rg) {
            let replaced = from..=to;
            self.sentences.retain(|sn, _| !replaced.contains(sn));
        }
        self.sentences.insert(result.sn, result.text());
    }

    /// Applies the result of a response frame, if any.
    pub fn push_response(&mut self, response: &IatResponse) {
        if let Some(result) = &response.result {
            self.push(result);
        }
    }

    /// Current transcript text.
    pub fn text(&self) -> String {
        self.sentences.values().map(String::as_str).collect()
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Step {
    Frame(Option<Result<ResponseFrame, Error>>),
    Uploaded(Result<Result<UploadStats, Error>, JoinError>),
}

impl Client {
    /// Recognizes `audio`, yielding every response frame as it arrives.
    ///
    /// The audio is uploaded on a separate task while responses are read, so
    /// partial results show up before the upload has finished. The stream ends
    /// after the final frame and the connection is closed. Dropping the
    /// stream early stops the upload.
    pub fn iat<S>(
        &self,
        request: IatRequest,
        audio: S,
    ) -> impl Stream<Item = Result<IatResponse, Error>> + Send + '_
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        stream! {
            let conn = match self.open(request.endpoint.host(), IAT_PATH).await {
                Ok(conn) => Arc::new(conn),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let uploader = Uploader::new(request.business, request.format, request.encoding)
                .with_interval(self.config().upload_interval);
            let mut upload = AbortOnDrop(tokio::spawn({
                let conn = Arc::clone(&conn);
                async move { uploader.run(&conn, audio).await }
            }));
            let mut uploading = true;
            let mut failure = None;
            let mut frames = 0usize;

            match conn.responses() {
                Ok(mut responses) => loop {
                    let step = tokio::select! {
                        item = responses.next_ok() => Step::Frame(item),
                        joined = &mut upload.0, if uploading => Step::Uploaded(joined),
                    };

                    match step {
                        Step::Frame(None) => break,
                        Step::Frame(Some(item)) => match item.and_then(IatResponse::try_from) {
                            Ok(response) => {
                                frames += 1;
                                debug!(conn_id = %conn.id(), status = ?response.status, text = %response.text(), "IAT result");
                                yield Ok(response);
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        },
                        Step::Uploaded(joined) => {
                            uploading = false;
                            match joined {
                                Ok(Ok(stats)) => {
                                    debug!(conn_id = %conn.id(), frames = stats.frames, "IAT upload done");
                                }
                                Ok(Err(e)) => {
                                    failure = Some(e);
                                    break;
                                }
                                Err(e) => {
                                    failure = Some(Error::Transport(format!("upload task failed: {e}")));
                                    break;
                                }
                            }
                        }
                    }
                },
                Err(e) => failure = Some(e),
            }

            upload.0.abort();
            if let Err(e) = conn.close().await {
                warn!(conn_id = %conn.id(), error = %e, "IAT close failed");
            }

            match failure {
                Some(e) => yield Err(e),
                None => info!(conn_id = %conn.id(), frames = frames, "IAT finished"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(json: &str) -> IatResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_endpoint_hosts() {
        assert_eq!(IatEndpoint::Default.host(), "iat-api.xfyun.cn");
        assert_eq!(IatEndpoint::Niche.host(), "iat-niche-api.xfyun.cn");
    }

    #[test]
    fn test_business_json() {
        let mut business = IatBusiness::new("zh_cn", IatDomain::Iat, "mandarin");
        business.dwa = Some("wpgs".to_string());
        business.pd = Some(PersonalDomain::Trip);

        assert_eq!(
            serde_json::to_value(&business).unwrap(),
            serde_json::json!({
                "language": "zh_cn",
                "domain": "iat",
                "accent": "mandarin",
                "dwa": "wpgs",
                "pd": "trip",
            })
        );

        business.domain = IatDomain::GovSeatAssistant;
        assert_eq!(serde_json::to_value(&business).unwrap()["domain"], "gov-seat-assistant");
    }

    #[test]
    fn test_response_from_frame() {
        let frame = ResponseFrame::parse(
            r#"{"code":0,"message":"success","sid":"iat1","data":{"status":1,"result":{"sn":1,"ls":false,"bg":0,"ed":0,"ws":[{"bg":10,"cw":[{"sc":0,"w":"4月"}]},{"bg":40,"cw":[{"w":"13日"}]}]}}}"#,
        )
        .unwrap();
        let response = IatResponse::try_from(frame).unwrap();

        assert_eq!(response.status, Status::Continue);
        assert_eq!(response.sid.as_deref(), Some("iat1"));
        assert_eq!(response.text(), "4月13日");
    }

    #[test]
    fn test_transcript_appends() {
        let mut transcript = Transcript::new();
        transcript.push(&result(r#"{"sn":1,"ws":[{"cw":[{"w":"你好"}]}]}"#));
        transcript.push(&result(r#"{"sn":2,"ws":[{"cw":[{"w":"，世界"}]}]}"#));
        assert_eq!(transcript.text(), "你好，世界");
    }

    #[test]
    fn test_transcript_replaces_range() {
        let mut transcript = Transcript::new();
        transcript.push(&result(r#"{"sn":1,"pgs":"apd","ws":[{"cw":[{"w":"四"}]}]}"#));
        transcript.push(&result(r#"{"sn":2,"pgs":"apd","ws":[{"cw":[{"w":"月十"}]}]}"#));
        transcript.push(&result(
            r#"{"sn":3,"pgs":"rpl","rg":[1,2],"ws":[{"cw":[{"w":"4月13日"}]}]}"#,
        ));
        assert_eq!(transcript.text(), "4月13日");
    }

    #[test]
    fn test_transcript_extreme_indices() {
        let mut transcript = Transcript::new();
        transcript.push(&result(r#"{"sn":1,"ws":[{"cw":[{"w":"a"}]}]}"#));
        transcript.push(&result(r#"{"sn":4294967295,"ws":[{"cw":[{"w":"b"}]}]}"#));
        assert_eq!(transcript.text(), "ab");

        transcript.push(&result(
            r#"{"sn":2,"pgs":"rpl","rg":[0,4294967295],"ws":[{"cw":[{"w":"c"}]}]}"#,
        ));
        assert_eq!(transcript.text(), "c");
    }
}
