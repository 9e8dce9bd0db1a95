use std::collections::HashMap;
use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use navigator_logging::{nav_debug, nav_info, nav_warn};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiSettings, AuthToken};
use crate::stream::{ChannelProgressSink, ChatStreamer};
use crate::{CompletionRequest, EngineEvent, RequestId};

enum EngineCommand {
    Send {
        request_id: RequestId,
        request: CompletionRequest,
    },
    Abort {
        request_id: RequestId,
    },
    LoadHistory {
        chat_id: String,
    },
    Rename {
        chat_id: String,
        name: String,
    },
}

type InFlight = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

/// Owns the IO thread. Dropping the last clone stops the thread and cancels
/// whatever is still running.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    /// Starts the engine thread with its own [`ApiClient`].
    ///
    /// The client is built here rather than passed in: a `reqwest` pool keeps
    /// idle connections bound to the runtime that opened them, so a client
    /// already used on another runtime can stall on a reused connection.
    pub fn new(
        settings: &ApiSettings,
        token: AuthToken,
        streamer: Arc<dyn ChatStreamer>,
    ) -> io::Result<Self> {
        let api = ApiClient::new(settings, token).map_err(io::Error::other)?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;
        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));

        thread::Builder::new()
            .name("navigator-engine".to_string())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    dispatch(
                        &runtime,
                        command,
                        &api,
                        &streamer,
                        &in_flight,
                        &event_tx,
                    );
                }
                nav_debug!("Engine command channel closed");
                cancel_all(&in_flight);
            })?;

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    pub fn send(&self, request_id: RequestId, request: CompletionRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Send {
            request_id,
            request,
        });
    }

    pub fn abort(&self, request_id: RequestId) {
        let _ = self.cmd_tx.send(EngineCommand::Abort { request_id });
    }

    pub fn load_history(&self, chat_id: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::LoadHistory {
            chat_id: chat_id.into(),
        });
    }

    pub fn rename(&self, chat_id: impl Into<String>, name: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Rename {
            chat_id: chat_id.into(),
            name: name.into(),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.recv_timeout(timeout).ok()
    }
}

fn dispatch(
    runtime: &tokio::runtime::Runtime,
    command: EngineCommand,
    api: &ApiClient,
    streamer: &Arc<dyn ChatStreamer>,
    in_flight: &InFlight,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Send {
            request_id,
            request,
        } => {
            let cancel = CancellationToken::new();
            if let Ok(mut map) = in_flight.lock() {
                map.insert(request_id, cancel.clone());
            }
            let streamer = streamer.clone();
            let in_flight = in_flight.clone();
            let event_tx = event_tx.clone();
            runtime.spawn(async move {
                let sink = ChannelProgressSink::new(event_tx.clone());
                let result = streamer.stream(request_id, &request, &sink, &cancel).await;
                if let Ok(mut map) = in_flight.lock() {
                    map.remove(&request_id);
                }
                if let Err(err) = &result {
                    nav_warn!("Request {} failed: {}", request_id, err);
                }
                let _ = event_tx.send(EngineEvent::StreamCompleted { request_id, result });
            });
        }
        EngineCommand::Abort { request_id } => {
            let token = in_flight
                .lock()
                .ok()
                .and_then(|mut map| map.remove(&request_id));
            match token {
                Some(token) => {
                    nav_info!("Aborting request {}", request_id);
                    token.cancel();
                }
                None => nav_debug!("Abort for unknown request {}", request_id),
            }
        }
        EngineCommand::LoadHistory { chat_id } => {
            let api = api.clone();
            let event_tx = event_tx.clone();
            runtime.spawn(async move {
                let event = match api.chat_messages(&chat_id).await {
                    Ok(history) => EngineEvent::HistoryLoaded {
                        chat_id,
                        messages: history.messages,
                    },
                    Err(err) => EngineEvent::HistoryFailed {
                        chat_id,
                        message: err.to_string(),
                    },
                };
                let _ = event_tx.send(event);
            });
        }
        EngineCommand::Rename { chat_id, name } => {
            let api = api.clone();
            let event_tx = event_tx.clone();
            runtime.spawn(async move {
                if let Err(err) = api.rename_chat(&chat_id, &name).await {
                    let _ = event_tx.send(EngineEvent::RenameFailed {
                        chat_id,
                        code: err.code(),
                        message: err.detail(),
                    });
                }
            });
        }
    }
}

fn cancel_all(in_flight: &InFlight) {
    if let Ok(mut map) = in_flight.lock() {
        for (_, token) in map.drain() {
            token.cancel();
        }
    }
}
