use navigator_logging::{nav_debug, nav_warn};
use serde_json::Value;

use crate::chunk::{error_message, parse_frame, FrameEvent};
use crate::frame::FrameSplitter;
use crate::{FailureKind, StreamError};

pub const EMPTY_REPLY_MESSAGE: &str = "The model finished without responding. Please make sure the model can be loaded correctly on the server side. The server may have run out of capacity while running the model.";

/// Per-request reassembly state: the raw frame buffer and the reply so far.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    frames: FrameSplitter,
    completed: String,
    frame_count: usize,
    stopped: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text received so far.
    pub fn completed(&self) -> &str {
        &self.completed
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Whether a frame carried `finish_reason: "stop"`.
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Feeds decoded text and returns the deltas it completed, in order.
    pub fn feed(&mut self, text: &str) -> Result<Vec<String>, StreamError> {
        let mut deltas = Vec::new();
        for payload in self.frames.push(text) {
            if let Some(delta) = self.apply(&payload)? {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Flushes the buffered remainder and returns the whole reply text.
    ///
    /// Also returns the delta carried by the final frame, if any, so the
    /// caller can render it.
    pub fn finish(&mut self) -> Result<(String, Option<String>), StreamError> {
        if !self.frames.saw_delimiter() {
            let body = self.frames.finish().unwrap_or_default();
            return Err(non_stream_body_error(&body));
        }

        let mut last_delta = None;
        if let Some(payload) = self.frames.finish() {
            match self.apply(&payload) {
                Ok(delta) => last_delta = delta,
                Err(err) if err.kind == FailureKind::MalformedFrame => {
                    nav_warn!("Dropping incomplete final frame: {}", err.message);
                }
                Err(err) => return Err(err),
            }
        }

        if self.completed.is_empty() {
            return Err(StreamError::new(FailureKind::EmptyReply, EMPTY_REPLY_MESSAGE));
        }
        nav_debug!(
            "Stream finished frames={} chars={} stopped={}",
            self.frame_count,
            self.completed.chars().count(),
            self.stopped
        );
        Ok((std::mem::take(&mut self.completed), last_delta))
    }

    fn apply(&mut self, payload: &str) -> Result<Option<String>, StreamError> {
        self.frame_count += 1;
        match parse_frame(payload)? {
            FrameEvent::Delta(text) => {
                self.completed.push_str(&text);
                Ok(Some(text))
            }
            FrameEvent::Stop => {
                self.stopped = true;
                Ok(None)
            }
            FrameEvent::Empty | FrameEvent::Done => Ok(None),
        }
    }
}

/// A body without any frame delimiter is an error document, not a stream.
fn non_stream_body_error(body: &str) -> StreamError {
    if body.trim().is_empty() {
        return StreamError::new(FailureKind::EmptyReply, EMPTY_REPLY_MESSAGE);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let message = value
                .get("error")
                .filter(|error| !error.is_null() && !error.is_number())
                .map(error_message)
                .or_else(|| {
                    value
                        .get("message")
                        .and_then(Value::as_str)
                        .map(ToOwned::to_owned)
                })
                .unwrap_or_else(|| value.to_string());
            StreamError::new(FailureKind::ServerError, message)
        }
        Err(_) => StreamError::new(
            FailureKind::MalformedFrame,
            "response is not an event stream",
        ),
    }
}
