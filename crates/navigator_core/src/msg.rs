use crate::{ChatMessage, RequestId, TicketRef};

/// Final, validated model reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub answer: String,
    pub references: Vec<TicketRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the prompt input.
    InputChanged(String),
    /// User submitted the current prompt input.
    InputSubmitted,
    /// A chat was selected; its history is requested.
    ChatOpened { chat_id: String, name: String },
    /// Stored messages for a chat arrived from the server.
    HistoryLoaded {
        chat_id: String,
        messages: Vec<ChatMessage>,
    },
    /// Stored messages could not be fetched; ignored unless the chat is open.
    HistoryFailed { chat_id: String, message: String },
    /// Engine decoded a text fragment for a request.
    DeltaReceived { request_id: RequestId, text: String },
    /// Engine finished a request and validated the reply.
    StreamCompleted {
        request_id: RequestId,
        reply: Reply,
        elapsed_ms: u64,
    },
    /// Engine gave up on a request.
    StreamFailed {
        request_id: RequestId,
        message: String,
    },
    /// User asked to stop the in-flight reply.
    AbortClicked,
    RenameSubmitted(String),
    RenameFailed { code: i64, message: String },
    /// User moved the ticket panel to the message at this index.
    FocusMessage(usize),
    DismissError,
    /// Render tick to coalesce terminal output.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
