use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use navigator_core::{
    ChatMessage, Effect, MessageStatus, Msg, Reply, Source, TicketRef, Turn,
};
use navigator_engine::{
    ApiMessage, CompletionRequest, ContextTurn, EngineEvent, EngineHandle, Reference,
    STATUS_ERROR, STATUS_PENDING,
};
use navigator_logging::{nav_info, nav_warn};

/// Per-request values that come from configuration, not from the chat.
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    pub prompt: String,
    pub temperature: f32,
    pub industries: Vec<String>,
}

pub struct EffectRunner {
    engine: EngineHandle,
    defaults: RequestDefaults,
}

impl EffectRunner {
    pub fn new<T>(engine: EngineHandle, defaults: RequestDefaults, msg_tx: mpsc::Sender<T>) -> Self
    where
        T: From<Msg> + Send + 'static,
    {
        let runner = Self { engine, defaults };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SendMessage {
                    request_id,
                    chat_id,
                    text,
                    context,
                } => {
                    nav_info!(
                        "SendMessage request_id={} chat_id={} text_len={} context_turns={}",
                        request_id,
                        chat_id,
                        text.len(),
                        context.len()
                    );
                    let request = build_request(&self.defaults, chat_id, text, context);
                    self.engine.send(request_id, request);
                }
                Effect::AbortRequest { request_id } => {
                    self.engine.abort(request_id);
                }
                Effect::LoadHistory { chat_id } => {
                    self.engine.load_history(chat_id);
                }
                Effect::RenameChat { chat_id, name } => {
                    nav_info!("RenameChat chat_id={} name_len={}", chat_id, name.len());
                    self.engine.rename(chat_id, name);
                }
            }
        }
    }

    fn spawn_event_loop<T>(&self, msg_tx: mpsc::Sender<T>)
    where
        T: From<Msg> + Send + 'static,
    {
        let engine = self.engine.clone();
        thread::spawn(move || loop {
            if let Some(event) = engine.recv_timeout(Duration::from_millis(50)) {
                if msg_tx.send(T::from(map_event(event))).is_err() {
                    break;
                }
            }
        });
    }
}

pub(crate) fn build_request(
    defaults: &RequestDefaults,
    chat_id: String,
    text: String,
    context: Vec<Turn>,
) -> CompletionRequest {
    CompletionRequest {
        chat_id,
        text,
        context: context
            .into_iter()
            .map(|turn| ContextTurn {
                user: turn.user,
                assistant: turn.assistant,
            })
            .collect(),
        prompt: defaults.prompt.clone(),
        temperature: defaults.temperature,
        stream: true,
        industries: defaults.industries.clone(),
    }
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Delta { request_id, text } => Msg::DeltaReceived { request_id, text },
        EngineEvent::StreamCompleted { request_id, result } => match result {
            Ok(outcome) => Msg::StreamCompleted {
                request_id,
                reply: Reply {
                    answer: outcome.reply.answer,
                    references: outcome.reply.references.into_iter().map(map_reference).collect(),
                },
                elapsed_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            },
            Err(err) => {
                nav_warn!("Request {} failed: {}", request_id, err);
                Msg::StreamFailed {
                    request_id,
                    message: err.user_message(),
                }
            }
        },
        EngineEvent::HistoryLoaded { chat_id, messages } => Msg::HistoryLoaded {
            chat_id,
            messages: messages.into_iter().map(map_message).collect(),
        },
        EngineEvent::HistoryFailed { chat_id, message } => {
            nav_warn!("History for {} failed: {}", chat_id, message);
            Msg::HistoryFailed { chat_id, message }
        }
        EngineEvent::RenameFailed { code, message, .. } => Msg::RenameFailed { code, message },
    }
}

pub(crate) fn map_reference(reference: Reference) -> TicketRef {
    TicketRef {
        accident_id: reference.accident_id,
        event_type: reference.event_type,
        industry_type: reference.industry_type,
        title: reference.accident_title,
        url: reference.url,
        color: reference.color,
    }
}

pub(crate) fn map_message(message: ApiMessage) -> ChatMessage {
    let source = if message.is_user() {
        Source::User
    } else {
        Source::Model
    };
    let status = match message.status {
        STATUS_ERROR => MessageStatus::Failed,
        STATUS_PENDING => MessageStatus::Pending,
        _ => MessageStatus::Complete,
    };
    ChatMessage {
        source,
        status,
        content: message.parts.answer,
        references: message.parts.references.into_iter().map(map_reference).collect(),
        elapsed_ms: None,
    }
}
