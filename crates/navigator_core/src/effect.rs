use crate::{RequestId, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start streaming a reply for `text`, sending `context` as prior turns.
    SendMessage {
        request_id: RequestId,
        chat_id: String,
        text: String,
        context: Vec<Turn>,
    },
    /// Cancel the in-flight request.
    AbortRequest { request_id: RequestId },
    LoadHistory { chat_id: String },
    RenameChat { chat_id: String, name: String },
}
