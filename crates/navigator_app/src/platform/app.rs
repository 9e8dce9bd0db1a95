use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use navigator_core::{update, ChatState, MessageStatus, Msg};
use navigator_engine::EngineHandle;
use navigator_logging::{nav_debug, nav_info};

use super::effects::{EffectRunner, RequestDefaults};
use super::render::TerminalRenderer;

const TICK_INTERVAL: Duration = Duration::from_millis(75);

pub const HELP: &str = "commands: /stop  /rename NAME  /refs N  /dismiss  /help  /quit";

/// Everything the session loop reacts to.
#[derive(Debug)]
pub enum Inbound {
    Msg(Msg),
    Line(String),
    InputClosed,
}

impl From<Msg> for Inbound {
    fn from(msg: Msg) -> Self {
        Inbound::Msg(msg)
    }
}

/// What a line typed by the user asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Send(Vec<Msg>),
    Note(String),
    Quit,
}

pub fn parse_line(line: &str) -> LineAction {
    let trimmed = line.trim();
    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (trimmed, ""),
    };
    match command {
        "/quit" | "/exit" => LineAction::Quit,
        "/stop" => LineAction::Send(vec![Msg::AbortClicked]),
        "/dismiss" => LineAction::Send(vec![Msg::DismissError]),
        "/help" => LineAction::Note(HELP.to_string()),
        "/rename" if !argument.is_empty() => {
            LineAction::Send(vec![Msg::RenameSubmitted(argument.to_string())])
        }
        "/refs" => match argument.parse::<usize>() {
            Ok(number) if number > 0 => LineAction::Send(vec![Msg::FocusMessage(number - 1)]),
            _ => LineAction::Note("usage: /refs N (message number, from 1)".to_string()),
        },
        _ if command.starts_with('/') => LineAction::Note(format!("unknown command, {HELP}")),
        _ => LineAction::Send(vec![
            Msg::InputChanged(trimmed.to_string()),
            Msg::InputSubmitted,
        ]),
    }
}

/// One open chat: state machine, effect runner and renderer wired together.
pub struct ChatSession<W: Write> {
    state: ChatState,
    runner: EffectRunner,
    renderer: TerminalRenderer<W>,
    inbox: mpsc::Receiver<Inbound>,
    inbox_tx: mpsc::Sender<Inbound>,
    needs_render: bool,
}

impl<W: Write> ChatSession<W> {
    pub fn new(engine: EngineHandle, defaults: RequestDefaults, context_budget: u32, out: W) -> Self {
        let (inbox_tx, inbox) = mpsc::channel::<Inbound>();
        let runner = EffectRunner::new(engine, defaults, inbox_tx.clone());

        // Background tick to throttle rendering while deltas pour in.
        let tick_tx = inbox_tx.clone();
        thread::spawn(move || {
            while tick_tx.send(Inbound::Msg(Msg::Tick)).is_ok() {
                thread::sleep(TICK_INTERVAL);
            }
        });

        Self {
            state: ChatState::with_context_budget(context_budget),
            runner,
            renderer: TerminalRenderer::new(out),
            inbox,
            inbox_tx,
            needs_render: false,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.needs_render |= state.consume_dirty();
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn render(&mut self) -> anyhow::Result<()> {
        if self.needs_render {
            self.renderer
                .render(&self.state.view())
                .context("failed to write to terminal")?;
            self.needs_render = false;
        }
        Ok(())
    }

    /// Pumps engine messages until one matches `done` or `timeout` passes.
    ///
    /// Returns whether `done` matched.
    pub fn wait_for(
        &mut self,
        done: impl Fn(&Msg) -> bool,
        timeout: Duration,
    ) -> anyhow::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.render()?;
                return Ok(false);
            }
            let Ok(inbound) = self.inbox.recv_timeout(remaining) else {
                continue;
            };
            if let Inbound::Msg(msg) = inbound {
                let matched = done(&msg);
                let tick = msg == Msg::Tick;
                self.dispatch(msg);
                if matched {
                    self.render()?;
                    return Ok(true);
                }
                // Deltas are flushed on ticks only.
                if tick || !self.state.is_busy() {
                    self.render()?;
                }
            }
        }
    }

    /// Opens `chat_id` and waits for its history.
    pub fn open(&mut self, chat_id: &str, name: &str, timeout: Duration) -> anyhow::Result<()> {
        self.dispatch(Msg::ChatOpened {
            chat_id: chat_id.to_string(),
            name: name.to_string(),
        });
        let loaded = self.wait_for(
            |msg| matches!(msg, Msg::HistoryLoaded { .. } | Msg::HistoryFailed { .. }),
            timeout,
        )?;
        if !loaded {
            nav_info!("History for {} did not arrive in time", chat_id);
        }
        Ok(())
    }

    /// Sends one prompt and blocks until its reply settles.
    ///
    /// Returns the final status of the reply.
    pub fn ask(&mut self, text: &str, timeout: Duration) -> anyhow::Result<MessageStatus> {
        self.dispatch(Msg::InputChanged(text.to_string()));
        self.dispatch(Msg::InputSubmitted);
        if !self.state.is_busy() {
            self.render()?;
            anyhow::bail!(self
                .state
                .view()
                .error
                .unwrap_or_else(|| "request was not sent".to_string()));
        }
        let settled = self.wait_for(
            |msg| matches!(msg, Msg::StreamCompleted { .. } | Msg::StreamFailed { .. }),
            timeout,
        )?;
        if !settled {
            self.dispatch(Msg::AbortClicked);
            self.render()?;
            anyhow::bail!("no reply within {} seconds", timeout.as_secs());
        }
        Ok(self
            .state
            .messages()
            .last()
            .map(|message| message.status)
            .unwrap_or(MessageStatus::Failed))
    }

    /// Interactive loop: lines from stdin, replies streamed to `out`.
    pub fn run_interactive(&mut self) -> anyhow::Result<()> {
        spawn_stdin_reader(self.inbox_tx.clone());
        self.renderer.note(HELP)?;

        loop {
            let Ok(inbound) = self.inbox.recv() else {
                break;
            };
            match inbound {
                Inbound::Msg(Msg::Tick) => {
                    self.dispatch(Msg::Tick);
                    self.render()?;
                }
                Inbound::Msg(msg) => self.dispatch(msg),
                Inbound::Line(line) => match parse_line(&line) {
                    LineAction::Send(msgs) => {
                        for msg in msgs {
                            self.dispatch(msg);
                        }
                        self.render()?;
                    }
                    LineAction::Note(text) => self.renderer.note(&text)?,
                    LineAction::Quit => break,
                },
                Inbound::InputClosed => {
                    nav_debug!("stdin closed");
                    break;
                }
            }
        }

        if self.state.is_busy() {
            self.dispatch(Msg::AbortClicked);
        }
        self.render()
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<Inbound>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(Inbound::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Inbound::InputClosed);
    });
}
