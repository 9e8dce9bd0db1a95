use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use navigator_core::MessageStatus;
use navigator_engine::{
    ApiClient, ApiError, ApiMessage, AuthToken, ChatSummary, EngineHandle, ReqwestStreamer,
};
use navigator_logging::{nav_info, nav_warn};

use crate::cli::Command;
use crate::platform::app::ChatSession;
use crate::platform::config::AppConfig;
use crate::platform::effects::{map_reference, RequestDefaults};
use crate::platform::persistence::{clear_session, load_session, save_session, StoredSession};
use crate::platform::render::format_ticket;

/// Slack on top of the stream timeout before `ask` gives up waiting.
const REPLY_GRACE: Duration = Duration::from_secs(15);

/// Shared pieces every command needs.
pub struct Runner {
    config: AppConfig,
    state_dir: PathBuf,
    session: Option<StoredSession>,
    token: AuthToken,
    api: ApiClient,
    runtime: tokio::runtime::Runtime,
}

impl Runner {
    pub fn new(config: AppConfig, state_dir: PathBuf) -> anyhow::Result<Self> {
        let session = load_session(&state_dir);
        let token = AuthToken::new(session.as_ref().map(|session| session.token.clone()));
        let api = ApiClient::new(&config.api_settings(), token.clone())
            .context("invalid backend configuration")?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        Ok(Self {
            config,
            state_dir,
            session,
            token,
            api,
            runtime,
        })
    }

    pub fn run(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Login { email, password } => self.login(&email, password),
            Command::Register {
                email,
                username,
                password,
            } => self.register(&email, &username, password),
            Command::Logout => self.logout(),
            Command::Whoami => self.whoami(),
            Command::Refresh => self.refresh(),
            Command::Chats => self.chats(),
            Command::New { name } => self.new_chat(name.as_deref()),
            Command::Delete { id } => {
                self.require_session()?;
                self.block_on(self.api.delete_chat(&id))?;
                println!("deleted {id}");
                Ok(())
            }
            Command::Rename { id, name } => {
                self.require_session()?;
                self.block_on(self.api.rename_chat(&id, &name))?;
                println!("renamed {id} to {name}");
                Ok(())
            }
            Command::History { id } => self.history(&id),
            Command::Ask {
                id,
                text,
                no_stream,
            } if no_stream => self.ask_blocking(&id, &text),
            Command::Ask { id, text, .. } => self.ask(&id, &text),
            Command::Chat { id } => self.chat(&id),
        }
    }

    fn block_on<T>(
        &self,
        future: impl std::future::Future<Output = Result<T, ApiError>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(future).map_err(|err| {
            if err.is_unauthorized() {
                anyhow::Error::new(err).context("session rejected, run `incident-nav login` again")
            } else {
                err.into()
            }
        })
    }

    fn require_session(&self) -> anyhow::Result<&StoredSession> {
        self.session
            .as_ref()
            .context("not logged in, run `incident-nav login` first")
    }

    fn login(&mut self, email: &str, password: Option<String>) -> anyhow::Result<()> {
        let password = password_or_prompt(password)?;
        let session = self.block_on(self.api.login(email, &password))?;
        let stored = StoredSession::from(session);
        let path = save_session(&self.state_dir, &stored)?;
        println!("logged in as {} ({})", stored.username, stored.email);
        nav_info!("Session stored at {:?}", path);
        self.session = Some(stored);
        Ok(())
    }

    fn register(
        &self,
        email: &str,
        username: &str,
        password: Option<String>,
    ) -> anyhow::Result<()> {
        let password = password_or_prompt(password)?;
        self.block_on(self.api.register(email, username, &password))?;
        println!("account created for {username}, you can now log in");
        Ok(())
    }

    fn logout(&mut self) -> anyhow::Result<()> {
        let result = if self.session.is_some() {
            self.block_on(self.api.logout())
        } else {
            Ok(())
        };
        clear_session(&self.state_dir)?;
        self.session = None;
        if let Err(err) = result {
            nav_warn!("Server logout failed: {:#}", err);
        }
        println!("logged out");
        Ok(())
    }

    fn whoami(&self) -> anyhow::Result<()> {
        self.require_session()?;
        let user = self.block_on(self.api.current_user())?;
        println!("{} <{}> id={}", user.username, user.email, user.id);
        Ok(())
    }

    fn refresh(&mut self) -> anyhow::Result<()> {
        let mut stored = self.require_session()?.clone();
        let refreshed = self.runtime.block_on(self.api.refresh_token());
        match refreshed {
            Ok(token) => {
                stored.token = token;
                save_session(&self.state_dir, &stored)?;
                self.session = Some(stored);
                println!("session refreshed");
                Ok(())
            }
            Err(err @ ApiError::Rejected { .. }) => {
                clear_session(&self.state_dir)?;
                self.session = None;
                Err(anyhow::Error::new(err).context("session expired, log in again"))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn chats(&self) -> anyhow::Result<()> {
        self.require_session()?;
        let chats = self.block_on(self.api.list_chats())?;
        if chats.is_empty() {
            println!("no chats yet, create one with `incident-nav new`");
        }
        for chat in &chats {
            println!("{}", format_chat(chat));
        }
        Ok(())
    }

    fn new_chat(&self, name: Option<&str>) -> anyhow::Result<()> {
        self.require_session()?;
        let chat = self.block_on(self.api.new_chat(name))?;
        println!("{}", format_chat(&chat));
        Ok(())
    }

    fn history(&self, chat_id: &str) -> anyhow::Result<()> {
        self.require_session()?;
        let history = self.block_on(self.api.chat_messages(chat_id))?;
        for message in history.messages {
            print_message(message);
        }
        Ok(())
    }

    fn ask_blocking(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        self.require_session()?;
        anyhow::ensure!(
            !text.trim().is_empty(),
            navigator_core::EMPTY_INPUT_ERROR
        );
        let reply = self.block_on(self.api.send_message(chat_id, text, &self.config.industries))?;
        print_message(reply);
        Ok(())
    }

    fn ask(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        let mut session = self.open_session(chat_id, io::stdout())?;
        let status = session.ask(text, self.reply_timeout())?;
        match status {
            MessageStatus::Complete => Ok(()),
            MessageStatus::Failed => {
                let error = session.state().view().error.unwrap_or_default();
                anyhow::bail!("reply failed: {error}")
            }
            other => anyhow::bail!("reply ended as {other:?}"),
        }
    }

    fn chat(&self, chat_id: &str) -> anyhow::Result<()> {
        let mut session = self.open_session(chat_id, io::stdout())?;
        session.run_interactive()
    }

    /// Starts an engine for `chat_id` and waits for its history.
    ///
    /// The engine builds its own HTTP clients: `self.api` lives on the
    /// one-shot runtime, which is idle while the session runs.
    fn open_session<W: Write>(&self, chat_id: &str, out: W) -> anyhow::Result<ChatSession<W>> {
        self.require_session()?;
        let info = self.block_on(self.api.chat_info(chat_id))?;
        let streamer = ReqwestStreamer::new(self.config.stream_settings(), self.token.clone())
            .context("failed to build streaming client")?;
        let engine = EngineHandle::new(
            &self.config.api_settings(),
            self.token.clone(),
            Arc::new(streamer),
        )
        .context("failed to start engine thread")?;
        let defaults = RequestDefaults {
            prompt: self.config.prompt.clone(),
            temperature: self.config.temperature,
            industries: self.config.industries.clone(),
        };
        let mut session =
            ChatSession::new(engine, defaults, self.config.max_context_tokens, out);
        session.open(&info.id, &info.name, self.history_timeout())?;
        Ok(session)
    }

    fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs) + REPLY_GRACE
    }

    fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stream_timeout_secs) + REPLY_GRACE
    }
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    anyhow::ensure!(!password.is_empty(), "password must not be empty");
    Ok(password)
}

fn format_chat(chat: &ChatSummary) -> String {
    format!("{}  {}  (updated {})", chat.id, chat.name, format_millis(chat.updated_at))
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_message(message: ApiMessage) {
    let prefix = if message.is_user() { "you" } else { "navigator" };
    let marker = match message.status {
        navigator_engine::STATUS_ERROR => " [failed]",
        navigator_engine::STATUS_PENDING => " [pending]",
        _ => "",
    };
    println!("{prefix}> {}{marker}", message.parts.answer);
    for reference in message.parts.references {
        println!("{}", format_ticket(&map_reference(reference)));
    }
}
