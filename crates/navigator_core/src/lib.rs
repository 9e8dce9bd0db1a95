//! Navigator core: pure chat state machine and view-model helpers.
mod context;
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use context::{estimate_tokens, ConversationContext, Turn, DEFAULT_CONTEXT_BUDGET};
pub use effect::Effect;
pub use msg::{Msg, Reply};
pub use state::{
    ChatMessage, ChatState, MessageStatus, RequestId, Source, StreamState, TicketRef,
    ABORTED_NOTICE, EMPTY_INPUT_ERROR, NO_CHAT_ERROR,
};
pub use update::update;
pub use view_model::{ChatViewModel, MessageRowView};
