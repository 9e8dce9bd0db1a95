use crate::view_model::{ChatViewModel, MessageRowView};
use crate::{ConversationContext, Reply, Turn};

pub type RequestId = u64;

pub const EMPTY_INPUT_ERROR: &str = "Your request is empty, please write an input.";
pub const NO_CHAT_ERROR: &str = "No chat is open.";
pub const ABORTED_NOTICE: &str = "You aborted the ongoing request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    User,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Complete,
    Aborted,
    Failed,
}

/// An incident ticket cited by a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketRef {
    pub accident_id: String,
    pub event_type: String,
    pub industry_type: String,
    pub title: String,
    pub url: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub source: Source,
    pub status: MessageStatus,
    pub content: String,
    pub references: Vec<TicketRef>,
    pub elapsed_ms: Option<u64>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            source: Source::User,
            status: MessageStatus::Complete,
            content: content.into(),
            references: Vec::new(),
            elapsed_ms: None,
        }
    }

    pub fn model(content: impl Into<String>, references: Vec<TicketRef>) -> Self {
        Self {
            source: Source::Model,
            status: MessageStatus::Complete,
            content: content.into(),
            references,
            elapsed_ms: None,
        }
    }

    fn pending_model() -> Self {
        Self {
            status: MessageStatus::Pending,
            ..Self::model(String::new(), Vec::new())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming {
        request_id: RequestId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenChat {
    id: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatState {
    chat: Option<OpenChat>,
    messages: Vec<ChatMessage>,
    input: String,
    stream: StreamState,
    next_request_id: RequestId,
    /// Index of the model message receiving deltas.
    pending_index: Option<usize>,
    error: Option<String>,
    notice: Option<String>,
    focus: Option<usize>,
    context: ConversationContext,
    dirty: bool,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_budget(budget: u32) -> Self {
        Self {
            context: ConversationContext::with_budget(budget),
            ..Self::default()
        }
    }

    pub fn stream(&self) -> StreamState {
        self.stream
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.stream, StreamState::Streaming { .. })
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat.as_ref().map(|chat| chat.id.as_str())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn view(&self) -> ChatViewModel {
        let rows = self
            .messages
            .iter()
            .enumerate()
            .map(|(index, msg)| MessageRowView {
                index,
                source: msg.source,
                status: msg.status,
                content: msg.content.clone(),
                reference_count: msg.references.len(),
                elapsed_ms: msg.elapsed_ms,
            })
            .collect();

        let tickets = self
            .focus
            .and_then(|index| self.messages.get(index))
            .filter(|msg| msg.source == Source::Model)
            .map(|msg| msg.references.clone())
            .unwrap_or_default();

        ChatViewModel {
            chat_id: self.chat.as_ref().map(|chat| chat.id.clone()),
            chat_name: self
                .chat
                .as_ref()
                .map(|chat| chat.name.clone())
                .unwrap_or_default(),
            input: self.input.clone(),
            rows,
            busy: self.is_busy(),
            error: self.error.clone(),
            notice: self.notice.clone(),
            focused: self.focus,
            tickets,
            context_turns: self.context.len(),
            context_tokens: self.context.total_tokens(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_input(&mut self, text: String) {
        if self.input != text {
            self.input = text;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.mark_dirty();
    }

    pub(crate) fn clear_banners(&mut self) {
        if self.error.take().is_some() | self.notice.take().is_some() {
            self.mark_dirty();
        }
    }

    /// Switches to another chat. Returns the request that was still
    /// streaming for the previous one, which the caller must cancel.
    pub(crate) fn open_chat(&mut self, id: String, name: String) -> Option<RequestId> {
        let orphaned = match self.stream {
            StreamState::Streaming { request_id } => Some(request_id),
            StreamState::Idle => None,
        };
        self.chat = Some(OpenChat { id, name });
        self.messages.clear();
        self.stream = StreamState::Idle;
        self.pending_index = None;
        self.focus = None;
        self.error = None;
        self.notice = None;
        self.context.clear();
        self.mark_dirty();
        orphaned
    }

    pub(crate) fn history_failed(&mut self, chat_id: &str, message: String) {
        if self.chat_id() == Some(chat_id) {
            self.set_error(message);
        }
    }

    /// Takes the input and starts a request. Returns `None` when nothing was
    /// sent; an error banner explains why when the user can act on it.
    pub(crate) fn begin_request(&mut self) -> Option<(RequestId, String, String, Vec<Turn>)> {
        if self.is_busy() {
            return None;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            self.set_error(EMPTY_INPUT_ERROR);
            return None;
        }
        let Some(chat_id) = self.chat_id().map(ToOwned::to_owned) else {
            self.set_error(NO_CHAT_ERROR);
            return None;
        };

        self.input.clear();
        self.error = None;
        self.notice = None;
        self.next_request_id += 1;
        let request_id = self.next_request_id;

        let context = self.context.snapshot();
        self.messages.push(ChatMessage::user(text.clone()));
        self.messages.push(ChatMessage::pending_model());
        self.pending_index = Some(self.messages.len() - 1);
        self.stream = StreamState::Streaming { request_id };
        self.mark_dirty();

        Some((request_id, chat_id, text, context))
    }

    fn pending_for(&self, request_id: RequestId) -> Option<usize> {
        match self.stream {
            StreamState::Streaming { request_id: current } if current == request_id => {
                self.pending_index
            }
            _ => None,
        }
    }

    fn finish_stream(&mut self) {
        self.stream = StreamState::Idle;
        self.pending_index = None;
    }

    pub(crate) fn apply_delta(&mut self, request_id: RequestId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(index) = self.pending_for(request_id) {
            self.messages[index].content.push_str(text);
            self.mark_dirty();
        }
    }

    pub(crate) fn apply_completed(&mut self, request_id: RequestId, reply: Reply, elapsed_ms: u64) {
        let Some(index) = self.pending_for(request_id) else {
            return;
        };
        let user_text = index
            .checked_sub(1)
            .and_then(|prev| self.messages.get(prev))
            .filter(|msg| msg.source == Source::User)
            .map(|msg| msg.content.clone())
            .unwrap_or_default();

        let message = &mut self.messages[index];
        message.content = reply.answer;
        message.references = reply.references;
        message.status = MessageStatus::Complete;
        message.elapsed_ms = Some(elapsed_ms);
        let turn = Turn::new(user_text, message.content.clone());

        self.context.push(turn);
        self.focus = Some(index);
        self.finish_stream();
        self.mark_dirty();
    }

    pub(crate) fn apply_failed(&mut self, request_id: RequestId, message: String) {
        let Some(index) = self.pending_for(request_id) else {
            return;
        };
        self.messages[index].status = MessageStatus::Failed;
        self.error = Some(message);
        self.finish_stream();
        self.mark_dirty();
    }

    /// Marks the in-flight reply aborted. Returns the cancelled request.
    pub(crate) fn abort(&mut self) -> Option<RequestId> {
        let StreamState::Streaming { request_id } = self.stream else {
            return None;
        };
        if let Some(index) = self.pending_index {
            self.messages[index].status = MessageStatus::Aborted;
        }
        self.notice = Some(ABORTED_NOTICE.to_string());
        self.finish_stream();
        self.mark_dirty();
        Some(request_id)
    }

    pub(crate) fn load_history(&mut self, chat_id: &str, messages: Vec<ChatMessage>) {
        if self.chat_id() != Some(chat_id) || self.is_busy() {
            return;
        }
        self.context.clear();
        let mut last_user: Option<&str> = None;
        for msg in &messages {
            match (msg.source, msg.status) {
                (Source::User, _) => last_user = Some(msg.content.as_str()),
                (Source::Model, MessageStatus::Complete) => {
                    if let Some(user) = last_user.take() {
                        self.context.push(Turn::new(user, msg.content.clone()));
                    }
                }
                (Source::Model, _) => last_user = None,
            }
        }
        self.focus = messages.iter().rposition(|msg| msg.source == Source::Model);
        self.messages = messages;
        self.mark_dirty();
    }

    pub(crate) fn set_focus(&mut self, index: usize) {
        let focus = (index < self.messages.len()).then_some(index);
        if self.focus != focus {
            self.focus = focus;
            self.mark_dirty();
        }
    }

    /// Applies a new chat name. Returns the chat id when the name changed.
    pub(crate) fn rename(&mut self, name: &str) -> Option<String> {
        let name = name.trim();
        let chat = self.chat.as_mut()?;
        if name.is_empty() || chat.name == name {
            return None;
        }
        chat.name = name.to_string();
        let id = chat.id.clone();
        self.mark_dirty();
        Some(id)
    }
}
