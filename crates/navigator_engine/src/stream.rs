use std::time::{Duration, Instant};

use futures_util::StreamExt;
use navigator_logging::{nav_debug, nav_info, nav_trace};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::accumulator::StreamAccumulator;
use crate::api::{parse_base_url, AuthToken};
use crate::chunk::error_message;
use crate::decode::StreamDecoder;
use crate::reply::parse_reply;
use crate::{
    CompletionRequest, EngineEvent, FailureKind, RequestId, StreamError, StreamOutcome,
};

pub const DEFAULT_COMPLETION_PATH: &str = "rest/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub base_url: String,
    pub completion_path: String,
    pub connect_timeout: Duration,
    /// Upper bound for a whole reply, headers to last byte.
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/".to_string(),
            completion_path: DEFAULT_COMPLETION_PATH.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

impl StreamSettings {
    pub fn endpoint(&self) -> Result<Url, StreamError> {
        parse_base_url(&self.base_url)
            .map_err(|err| StreamError::new(FailureKind::InvalidUrl, err.to_string()))?
            .join(self.completion_path.trim_start_matches('/'))
            .map_err(|err| StreamError::new(FailureKind::InvalidUrl, err.to_string()))
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

#[async_trait::async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Streams one reply, emitting an [`EngineEvent::Delta`] per text fragment.
    ///
    /// Once `cancel` fires no further deltas are emitted and the call fails
    /// with [`FailureKind::Cancelled`].
    async fn stream(
        &self,
        request_id: RequestId,
        request: &CompletionRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, StreamError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestStreamer {
    settings: StreamSettings,
    client: reqwest::Client,
    token: AuthToken,
}

impl ReqwestStreamer {
    pub fn new(settings: StreamSettings, token: AuthToken) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| StreamError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            client,
            token,
        })
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    fn check_size(&self, actual: u64) -> Result<(), StreamError> {
        if actual > self.settings.max_bytes {
            return Err(StreamError::new(
                FailureKind::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(actual),
                },
                "response too large",
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatStreamer for ReqwestStreamer {
    async fn stream(
        &self,
        request_id: RequestId,
        request: &CompletionRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, StreamError> {
        let url = self.settings.endpoint()?;
        let started = Instant::now();
        nav_info!(
            "Streaming request_id={} chat_id={} text_len={} context_turns={}",
            request_id,
            request.chat_id,
            request.text.len(),
            request.context.len()
        );

        let mut builder = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request);
        if let Some(token) = self.token.get() {
            builder = builder.bearer_auth(token);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::cancelled()),
            response = builder.send() => response.map_err(map_reqwest_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_body_message(&body),
            ));
        }
        if let Some(content_len) = response.content_length() {
            self.check_size(content_len)?;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let mut decoder = StreamDecoder::for_content_type(content_type.as_deref());
        let mut accumulator = StreamAccumulator::new();
        let mut byte_len: u64 = 0;
        let mut delta_count = 0usize;

        // A chunk can carry several deltas; none may follow a cancellation.
        let mut emit = |text: String| -> Result<(), StreamError> {
            if cancel.is_cancelled() {
                nav_debug!("request_id={} cancelled mid-chunk", request_id);
                return Err(StreamError::cancelled());
            }
            delta_count += 1;
            sink.emit(EngineEvent::Delta { request_id, text });
            Ok(())
        };

        let mut body = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    nav_debug!("request_id={} cancelled after {} bytes", request_id, byte_len);
                    return Err(StreamError::cancelled());
                }
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(map_reqwest_error)?;
            byte_len += chunk.len() as u64;
            self.check_size(byte_len)?;
            nav_trace!("request_id={} read {} bytes", request_id, chunk.len());

            let text = decoder
                .decode(&chunk, false)
                .map_err(|err| StreamError::new(FailureKind::Decode, err.to_string()))?;
            for delta in accumulator.feed(&text)? {
                emit(delta)?;
            }
        }

        let tail = decoder
            .decode(&[], true)
            .map_err(|err| StreamError::new(FailureKind::Decode, err.to_string()))?;
        for delta in accumulator.feed(&tail)? {
            emit(delta)?;
        }
        let (completed_text, last_delta) = accumulator.finish()?;
        if let Some(delta) = last_delta {
            emit(delta)?;
        }

        let reply = parse_reply(&completed_text)?;
        let elapsed = started.elapsed();
        nav_info!(
            "Stream done request_id={} deltas={} bytes={} references={} elapsed_ms={}",
            request_id,
            delta_count,
            byte_len,
            reply.references.len(),
            elapsed.as_millis()
        );

        Ok(StreamOutcome {
            reply,
            completed_text,
            delta_count,
            byte_len,
            elapsed,
        })
    }
}

fn error_body_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("message")
            .and_then(|m| m.as_str())
            .map(ToOwned::to_owned)
            .or_else(|| {
                value
                    .get("error")
                    .filter(|e| e.is_object() || e.is_string())
                    .map(error_message)
            })
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> StreamError {
    let message = navigator_logging::redact_bearer(&err.to_string());
    if err.is_timeout() {
        return StreamError::new(FailureKind::Timeout, message);
    }
    StreamError::new(FailureKind::Network, message)
}
