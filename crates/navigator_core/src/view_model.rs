use crate::{MessageStatus, Source, TicketRef};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatViewModel {
    pub chat_id: Option<String>,
    pub chat_name: String,
    pub input: String,
    pub rows: Vec<MessageRowView>,
    pub busy: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub focused: Option<usize>,
    /// References of the focused model message.
    pub tickets: Vec<TicketRef>,
    pub context_turns: usize,
    pub context_tokens: u32,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRowView {
    pub index: usize,
    pub source: Source,
    pub status: MessageStatus,
    pub content: String,
    pub reference_count: usize,
    pub elapsed_ms: Option<u64>,
}
