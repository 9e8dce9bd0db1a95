use navigator_core::{
    update, ChatMessage, ChatState, Effect, MessageStatus, Msg, Reply, TicketRef, ABORTED_NOTICE,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    navigator_logging::initialize_for_tests();
}

fn streaming_state() -> ChatState {
    let (state, _) = update(
        ChatState::new(),
        Msg::ChatOpened {
            chat_id: "c1".to_string(),
            name: "Chat".to_string(),
        },
    );
    let (state, _) = update(state, Msg::InputChanged("Any boiler explosions?".to_string()));
    let (state, effects) = update(state, Msg::InputSubmitted);
    assert_eq!(effects.len(), 1);
    state
}

fn delta(request_id: u64, text: &str) -> Msg {
    Msg::DeltaReceived {
        request_id,
        text: text.to_string(),
    }
}

fn ticket(id: &str) -> TicketRef {
    TicketRef {
        accident_id: id.to_string(),
        event_type: "Explosion".to_string(),
        industry_type: "Chemicals".to_string(),
        title: "Boiler rupture".to_string(),
        url: format!("https://tickets.example.com/{id}"),
        color: "#ff0000".to_string(),
    }
}

#[test]
fn deltas_accumulate_into_pending_reply() {
    init_logging();
    let state = streaming_state();
    let (state, _) = update(state, delta(1, "Two "));
    let (state, _) = update(state, delta(1, "incidents"));
    let (mut state, effects) = update(state, delta(1, " match."));

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.rows[1].content, "Two incidents match.");
    assert_eq!(view.rows[1].status, MessageStatus::Pending);
    assert!(view.busy);
    assert!(state.consume_dirty());
}

#[test]
fn completion_replaces_text_and_focuses_reply() {
    init_logging();
    let state = streaming_state();
    let (state, _) = update(state, delta(1, r#"{"answer": "Two"#));
    let (state, _) = update(
        state,
        Msg::StreamCompleted {
            request_id: 1,
            reply: Reply {
                answer: "Two incidents match.".to_string(),
                references: vec![ticket("17"), ticket("42")],
            },
            elapsed_ms: 1250,
        },
    );

    let view = state.view();
    assert!(!view.busy);
    assert_eq!(view.rows[1].content, "Two incidents match.");
    assert_eq!(view.rows[1].status, MessageStatus::Complete);
    assert_eq!(view.rows[1].reference_count, 2);
    assert_eq!(view.rows[1].elapsed_ms, Some(1250));
    assert_eq!(view.focused, Some(1));
    assert_eq!(view.tickets, vec![ticket("17"), ticket("42")]);
    assert_eq!(view.context_turns, 1);
}

#[test]
fn failure_keeps_partial_text_and_shows_error() {
    init_logging();
    let state = streaming_state();
    let (state, _) = update(state, delta(1, "Partial"));
    let (state, _) = update(
        state,
        Msg::StreamFailed {
            request_id: 1,
            message: "http status 502".to_string(),
        },
    );

    let view = state.view();
    assert!(!view.busy);
    assert_eq!(view.rows[1].content, "Partial");
    assert_eq!(view.rows[1].status, MessageStatus::Failed);
    assert_eq!(view.error.as_deref(), Some("http status 502"));
    assert_eq!(view.context_turns, 0);
}

#[test]
fn abort_marks_reply_and_emits_effect() {
    init_logging();
    let state = streaming_state();
    let (state, _) = update(state, delta(1, "Half an ans"));
    let (state, effects) = update(state, Msg::AbortClicked);

    assert_eq!(effects, vec![Effect::AbortRequest { request_id: 1 }]);
    let view = state.view();
    assert!(!view.busy);
    assert_eq!(view.rows[1].status, MessageStatus::Aborted);
    assert_eq!(view.rows[1].content, "Half an ans");
    assert_eq!(view.notice.as_deref(), Some(ABORTED_NOTICE));

    // A second abort has nothing to cancel.
    let (_state, effects) = update(state, Msg::AbortClicked);
    assert!(effects.is_empty());
}

#[test]
fn late_events_after_abort_are_ignored() {
    init_logging();
    let state = streaming_state();
    let (mut state, _) = update(state, Msg::AbortClicked);
    assert!(state.consume_dirty());
    let before = state.view();

    let (state, _) = update(state, delta(1, "late"));
    let (state, _) = update(
        state,
        Msg::StreamFailed {
            request_id: 1,
            message: "cancelled".to_string(),
        },
    );
    let (mut state, _) = update(
        state,
        Msg::StreamCompleted {
            request_id: 1,
            reply: Reply::default(),
            elapsed_ms: 1,
        },
    );

    let after = state.view();
    assert_eq!(before.rows, after.rows);
    assert_eq!(after.error, None);
    assert!(!state.consume_dirty());
}

#[test]
fn deltas_for_other_requests_are_ignored() {
    init_logging();
    let state = streaming_state();
    let (state, _) = update(state, delta(99, "stray"));
    let (state, _) = update(state, delta(1, ""));

    assert!(state.view().rows[1].content.is_empty());
}

#[test]
fn history_replaces_messages_and_rebuilds_context() {
    init_logging();
    let (state, _) = update(
        ChatState::new(),
        Msg::ChatOpened {
            chat_id: "c1".to_string(),
            name: "Chat".to_string(),
        },
    );
    let failed = ChatMessage {
        status: MessageStatus::Failed,
        ..ChatMessage::model("Error 500", Vec::new())
    };
    let messages = vec![
        ChatMessage::user("q1"),
        ChatMessage::model("a1", vec![ticket("1")]),
        ChatMessage::user("q2"),
        failed,
        ChatMessage::user("q3"),
        ChatMessage::model("a3", Vec::new()),
    ];

    let (state, _) = update(
        state,
        Msg::HistoryLoaded {
            chat_id: "other".to_string(),
            messages: messages.clone(),
        },
    );
    assert!(state.view().rows.is_empty());

    let (state, _) = update(
        state,
        Msg::HistoryLoaded {
            chat_id: "c1".to_string(),
            messages,
        },
    );
    let view = state.view();
    assert_eq!(view.rows.len(), 6);
    assert_eq!(view.focused, Some(5));
    assert_eq!(
        state.context().snapshot(),
        vec![
            navigator_core::Turn::new("q1", "a1"),
            navigator_core::Turn::new("q3", "a3"),
        ]
    );

    let (state, _) = update(state, Msg::FocusMessage(1));
    assert_eq!(state.view().tickets, vec![ticket("1")]);
    let (state, _) = update(state, Msg::FocusMessage(0));
    assert!(state.view().tickets.is_empty());
    let (state, _) = update(state, Msg::FocusMessage(40));
    assert_eq!(state.view().focused, None);
}
