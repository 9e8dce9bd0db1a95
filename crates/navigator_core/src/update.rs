use crate::{ChatState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ChatState, msg: Msg) -> (ChatState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::InputSubmitted => match state.begin_request() {
            Some((request_id, chat_id, text, context)) => vec![Effect::SendMessage {
                request_id,
                chat_id,
                text,
                context,
            }],
            None => Vec::new(),
        },
        Msg::ChatOpened { chat_id, name } => {
            let mut effects = Vec::new();
            if let Some(request_id) = state.open_chat(chat_id.clone(), name) {
                effects.push(Effect::AbortRequest { request_id });
            }
            effects.push(Effect::LoadHistory { chat_id });
            effects
        }
        Msg::HistoryLoaded { chat_id, messages } => {
            state.load_history(&chat_id, messages);
            Vec::new()
        }
        Msg::HistoryFailed { chat_id, message } => {
            state.history_failed(&chat_id, message);
            Vec::new()
        }
        Msg::DeltaReceived { request_id, text } => {
            state.apply_delta(request_id, &text);
            Vec::new()
        }
        Msg::StreamCompleted {
            request_id,
            reply,
            elapsed_ms,
        } => {
            state.apply_completed(request_id, reply, elapsed_ms);
            Vec::new()
        }
        Msg::StreamFailed {
            request_id,
            message,
        } => {
            state.apply_failed(request_id, message);
            Vec::new()
        }
        Msg::AbortClicked => match state.abort() {
            Some(request_id) => vec![Effect::AbortRequest { request_id }],
            None => Vec::new(),
        },
        Msg::RenameSubmitted(name) => match state.rename(&name) {
            Some(chat_id) => vec![Effect::RenameChat {
                chat_id,
                name: name.trim().to_string(),
            }],
            None => Vec::new(),
        },
        Msg::RenameFailed { code, message } => {
            state.set_error(format!("Error {code}: {message}"));
            Vec::new()
        }
        Msg::FocusMessage(index) => {
            state.set_focus(index);
            Vec::new()
        }
        Msg::DismissError => {
            state.clear_banners();
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
