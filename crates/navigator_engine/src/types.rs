use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::api::ApiMessage;

pub type RequestId = u64;

/// A ticket cited by the assistant, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, deserialize_with = "string_or_number")]
    pub accident_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub industry_type: String,
    #[serde(default, alias = "title")]
    pub accident_title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub color: String,
}

/// Parsed assistant reply: the answer text and its ticket citations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplyParts {
    pub answer: String,
    pub references: Vec<Reference>,
}

/// One prior exchange sent along with a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextTurn {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub chat_id: String,
    pub text: String,
    pub context: Vec<ContextTurn>,
    pub prompt: String,
    pub temperature: f32,
    pub stream: bool,
    pub industries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub reply: ReplyParts,
    /// Concatenation of every delta, before reply parsing.
    pub completed_text: String,
    pub delta_count: usize,
    pub byte_len: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Delta {
        request_id: RequestId,
        text: String,
    },
    StreamCompleted {
        request_id: RequestId,
        result: Result<StreamOutcome, StreamError>,
    },
    HistoryLoaded {
        chat_id: String,
        messages: Vec<ApiMessage>,
    },
    HistoryFailed {
        chat_id: String,
        message: String,
    },
    RenameFailed {
        chat_id: String,
        code: i64,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StreamError {
    pub kind: FailureKind,
    pub message: String,
}

impl StreamError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "request aborted")
    }

    /// Text suitable for the chat error banner.
    pub fn user_message(&self) -> String {
        match &self.kind {
            FailureKind::HttpStatus(code) if self.message.is_empty() => format!("Error {code}"),
            FailureKind::HttpStatus(code) => format!("Error {code}: {}", self.message),
            FailureKind::ServerError
            | FailureKind::EmptyReply
            | FailureKind::InvalidReply { .. } => {
                format!("An error occurred: {}", self.message)
            }
            _ => format!("An error occurred: {self}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    Cancelled,
    Decode,
    /// A frame payload was not valid JSON.
    MalformedFrame,
    /// The server answered with an error document instead of a stream.
    ServerError,
    /// The stream ended without any text.
    EmptyReply,
    /// The final reply failed validation; `code` follows the server's numbering.
    InvalidReply { code: u8 },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::MalformedFrame => write!(f, "malformed frame"),
            FailureKind::ServerError => write!(f, "server error"),
            FailureKind::EmptyReply => write!(f, "empty reply"),
            FailureKind::InvalidReply { code } => write!(f, "invalid reply ({code})"),
        }
    }
}

/// Accepts `"17"` as well as `17` for identifiers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
