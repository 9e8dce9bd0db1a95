//! Chat-completion chunk frames and delta extraction.
use serde::Deserialize;
use serde_json::Value;

use crate::{FailureKind, StreamError};

/// Payload that some servers send after the last chunk.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// What a single frame contributes to the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Delta(String),
    /// The model reported `finish_reason: "stop"`; its content is ignored.
    Stop,
    /// A well-formed frame without text (role announcement, keep-alive).
    Empty,
    Done,
}

/// Extracts the text delta carried by one frame payload.
pub fn parse_frame(payload: &str) -> Result<FrameEvent, StreamError> {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(FrameEvent::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(payload).map_err(|err| {
        StreamError::new(
            FailureKind::MalformedFrame,
            format!("{err} in frame {}", preview(payload)),
        )
    })?;

    if let Some(error) = chunk.error.as_ref() {
        return Err(StreamError::new(
            FailureKind::ServerError,
            error_message(error),
        ));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(FrameEvent::Empty);
    };
    if choice.finish_reason.as_deref() == Some("stop") {
        return Ok(FrameEvent::Stop);
    }
    match choice.delta.content {
        Some(text) if !text.is_empty() => Ok(FrameEvent::Delta(text)),
        _ => Ok(FrameEvent::Empty),
    }
}

/// Best-effort human message out of an error document.
pub(crate) fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

fn preview(payload: &str) -> String {
    const MAX: usize = 80;
    match payload.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{:?}...", &payload[..cut]),
        None => format!("{payload:?}"),
    }
}
