use std::sync::Once;

use navigator_core::{
    update, ChatState, Effect, MessageStatus, Msg, Source, StreamState, Turn, EMPTY_INPUT_ERROR,
    NO_CHAT_ERROR,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(navigator_logging::initialize_for_tests);
}

fn open_chat(state: ChatState, chat_id: &str) -> ChatState {
    let (state, _) = update(
        state,
        Msg::ChatOpened {
            chat_id: chat_id.to_string(),
            name: "Pump failures".to_string(),
        },
    );
    state
}

fn submit(state: ChatState, input: &str) -> (ChatState, Vec<Effect>) {
    let (state, _) = update(state, Msg::InputChanged(input.to_string()));
    update(state, Msg::InputSubmitted)
}

#[test]
fn opening_a_chat_requests_history() {
    init_logging();
    let (mut state, effects) = update(
        ChatState::new(),
        Msg::ChatOpened {
            chat_id: "c1".to_string(),
            name: "Pump failures".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::LoadHistory {
            chat_id: "c1".to_string()
        }]
    );
    let view = state.view();
    assert_eq!(view.chat_id.as_deref(), Some("c1"));
    assert_eq!(view.chat_name, "Pump failures");
    assert!(state.consume_dirty());
}

#[test]
fn submit_appends_user_and_pending_model_message() {
    init_logging();
    let state = open_chat(ChatState::new(), "c1");
    let (state, effects) = submit(state, "  Which valves leaked last year?\n");

    assert_eq!(
        effects,
        vec![Effect::SendMessage {
            request_id: 1,
            chat_id: "c1".to_string(),
            text: "Which valves leaked last year?".to_string(),
            context: Vec::new(),
        }]
    );

    let view = state.view();
    assert!(view.busy);
    assert!(view.input.is_empty());
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.rows[0].source, Source::User);
    assert_eq!(view.rows[0].status, MessageStatus::Complete);
    assert_eq!(view.rows[0].content, "Which valves leaked last year?");
    assert_eq!(view.rows[1].source, Source::Model);
    assert_eq!(view.rows[1].status, MessageStatus::Pending);
    assert!(view.rows[1].content.is_empty());
    assert_eq!(state.stream(), StreamState::Streaming { request_id: 1 });
}

#[test]
fn empty_input_sets_error_and_sends_nothing() {
    init_logging();
    let state = open_chat(ChatState::new(), "c1");
    let (state, effects) = submit(state, "   \n\t");

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.error.as_deref(), Some(EMPTY_INPUT_ERROR));
    assert!(view.rows.is_empty());
    assert!(!view.busy);
}

#[test]
fn submit_without_chat_is_rejected() {
    init_logging();
    let (state, effects) = submit(ChatState::new(), "hello");

    assert!(effects.is_empty());
    assert_eq!(state.view().error.as_deref(), Some(NO_CHAT_ERROR));
}

#[test]
fn submit_while_busy_is_ignored() {
    init_logging();
    let state = open_chat(ChatState::new(), "c1");
    let (state, _) = submit(state, "first");
    let (state, effects) = submit(state, "second");

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.rows.len(), 2);
    // The typed text stays in the input box for later.
    assert_eq!(view.input, "second");
}

#[test]
fn completed_turns_are_sent_as_context() {
    init_logging();
    let state = open_chat(ChatState::new(), "c1");
    let (state, _) = submit(state, "first question");
    let (state, _) = update(
        state,
        Msg::StreamCompleted {
            request_id: 1,
            reply: navigator_core::Reply {
                answer: "first answer".to_string(),
                references: Vec::new(),
            },
            elapsed_ms: 10,
        },
    );
    let (_state, effects) = submit(state, "second question");

    assert_eq!(
        effects,
        vec![Effect::SendMessage {
            request_id: 2,
            chat_id: "c1".to_string(),
            text: "second question".to_string(),
            context: vec![Turn::new("first question", "first answer")],
        }]
    );
}

#[test]
fn rename_emits_effect_only_on_change() {
    init_logging();
    let state = open_chat(ChatState::new(), "c1");

    let (state, effects) = update(state, Msg::RenameSubmitted("  Pump failures ".to_string()));
    assert!(effects.is_empty());

    let (state, effects) = update(state, Msg::RenameSubmitted("   ".to_string()));
    assert!(effects.is_empty());

    let (state, effects) = update(state, Msg::RenameSubmitted(" Valve leaks ".to_string()));
    assert_eq!(
        effects,
        vec![Effect::RenameChat {
            chat_id: "c1".to_string(),
            name: "Valve leaks".to_string(),
        }]
    );
    assert_eq!(state.view().chat_name, "Valve leaks");

    let (state, _) = update(
        state,
        Msg::RenameFailed {
            code: 4,
            message: "Chat 'c1' not found".to_string(),
        },
    );
    assert_eq!(
        state.view().error.as_deref(),
        Some("Error 4: Chat 'c1' not found")
    );

    let (state, _) = update(state, Msg::DismissError);
    assert_eq!(state.view().error, None);
}

#[test]
fn switching_chats_mid_stream_cancels_the_request() {
    init_logging();
    let state = open_chat(ChatState::new(), "c1");
    let (state, _) = submit(state, "Any leaks?");

    let (state, effects) = update(
        state,
        Msg::ChatOpened {
            chat_id: "c2".to_string(),
            name: "Valves".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::AbortRequest { request_id: 1 },
            Effect::LoadHistory {
                chat_id: "c2".to_string()
            },
        ]
    );
    assert!(!state.is_busy());
    assert!(state.messages().is_empty());

    // The cancelled request's late delta lands nowhere.
    let (state, _) = update(
        state,
        Msg::DeltaReceived {
            request_id: 1,
            text: "stale".to_string(),
        },
    );
    assert!(state.messages().is_empty());
}

#[test]
fn history_failure_only_affects_the_open_chat() {
    init_logging();
    let state = open_chat(ChatState::new(), "c2");

    let (state, _) = update(
        state,
        Msg::HistoryFailed {
            chat_id: "c1".to_string(),
            message: "Error 404: Chat not found".to_string(),
        },
    );
    assert_eq!(state.view().error, None);

    let (state, _) = update(
        state,
        Msg::HistoryFailed {
            chat_id: "c2".to_string(),
            message: "Error 404: Chat not found".to_string(),
        },
    );
    assert_eq!(state.view().error.as_deref(), Some("Error 404: Chat not found"));
}
