//! Validation of the final assistant reply.
//!
//! The assistant may stream a JSON document `{"answer": .., "references": [..]}`.
//! Anything that does not look like a JSON object is taken as a plain answer.
use serde_json::{Map, Value};

use crate::{FailureKind, Reference, ReplyParts, StreamError};

pub const REPLY_ERROR_PREFIX: &str = "It seems the LLM of your configuration did not succeed in making a well done response, please retry or ask for a better LLM. Error is : ";

const REFERENCE_FIELDS: [(&str, u8); 6] = [
    ("accident_id", 6),
    ("event_type", 7),
    ("industry_type", 8),
    ("accident_title", 9),
    ("url", 10),
    ("color", 11),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", REPLY_ERROR_PREFIX, .reason)]
pub struct ReplyError {
    /// Numbering shared with the server's own reply validation.
    pub code: u8,
    pub reason: String,
}

impl ReplyError {
    fn new(code: u8, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl From<ReplyError> for StreamError {
    fn from(err: ReplyError) -> Self {
        StreamError::new(FailureKind::InvalidReply { code: err.code }, err.to_string())
    }
}

/// Turns the completed stream text into an answer and its references.
pub fn parse_reply(completed: &str) -> Result<ReplyParts, ReplyError> {
    let trimmed = completed.trim();
    if !trimmed.starts_with('{') {
        return Ok(ReplyParts {
            answer: completed.to_string(),
            references: Vec::new(),
        });
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| ReplyError::new(0, format!("Reply is not valid JSON ({err})")))?;
    match value {
        Value::Object(map) => validate_reply(&map),
        _ => Err(ReplyError::new(0, "Reply is not a JSON object")),
    }
}

/// Checks a reply document field by field, in the server's order.
pub fn validate_reply(map: &Map<String, Value>) -> Result<ReplyParts, ReplyError> {
    let answer = map
        .get("answer")
        .ok_or_else(|| ReplyError::new(1, "Missing answer field"))?;
    let references = map
        .get("references")
        .ok_or_else(|| ReplyError::new(2, "Missing references field"))?;
    let answer = answer
        .as_str()
        .ok_or_else(|| ReplyError::new(3, "Answer is not a string"))?;
    let references = references
        .as_array()
        .ok_or_else(|| ReplyError::new(4, "References is not a list"))?;

    let mut parsed = Vec::with_capacity(references.len());
    for reference in references {
        let fields = reference
            .as_object()
            .ok_or_else(|| ReplyError::new(5, "Reference is not a dictionary"))?;
        for (field, code) in REFERENCE_FIELDS {
            if !fields.contains_key(field) {
                return Err(ReplyError::new(code, format!("Missing {field} field")));
            }
        }
        let reference: Reference = serde_json::from_value(reference.clone())
            .map_err(|err| ReplyError::new(5, format!("Reference is malformed ({err})")))?;
        parsed.push(reference);
    }

    Ok(ReplyParts {
        answer: answer.to_string(),
        references: parsed,
    })
}
