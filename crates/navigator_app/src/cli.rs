//! Command-line surface of `incident-nav`.
//!
//! Every global flag can also come from the environment, e.g.
//!
//! ```bash
//! INCIDENT_NAV_BASE_URL=https://nav.example.com/api/ incident-nav chats
//! ```
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::platform::config::ConfigOverrides;
use crate::platform::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "incident-nav")]
#[command(about = "Ask the Incident Navigator assistant about operational incidents")]
#[command(version)]
pub struct Cli {
    /// Configuration file; defaults to incident-nav.ron in the state directory.
    #[arg(long, env = "INCIDENT_NAV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the session file and the default configuration.
    #[arg(long, env = "INCIDENT_NAV_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Backend base URL, overriding the configuration file.
    #[arg(long, env = "INCIDENT_NAV_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, value_enum, default_value = "file")]
    pub log: LogDestination,

    #[arg(long, env = "INCIDENT_NAV_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    #[command(flatten)]
    pub request: RequestArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Completion parameters, overriding the configuration file.
#[derive(Debug, Clone, Default, Args)]
pub struct RequestArgs {
    /// System prompt sent with each question.
    #[arg(long, global = true)]
    pub prompt: Option<String>,

    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Restrict ticket search to an industry; repeat for several.
    #[arg(long = "industry", global = true)]
    pub industries: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "INCIDENT_NAV_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "INCIDENT_NAV_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Log out and forget the stored session.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Exchange the session token for a fresh one.
    Refresh,
    /// List chats.
    Chats,
    /// Create a chat.
    New { name: Option<String> },
    /// Delete a chat.
    Delete { id: String },
    /// Rename a chat.
    Rename { id: String, name: String },
    /// Print the stored messages of a chat.
    History { id: String },
    /// Ask one question and stream the reply.
    Ask {
        id: String,
        text: String,
        /// Wait for the whole reply instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },
    /// Converse interactively in a chat.
    Chat { id: String },
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            prompt: self.request.prompt.clone(),
            temperature: self.request.temperature,
            industries: self.request.industries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_parses_chat_and_text() {
        let cli = Cli::parse_from([
            "incident-nav",
            "--base-url",
            "http://nav.local/",
            "ask",
            "c1",
            "Which valves leaked?",
            "--industry",
            "Chemicals",
        ]);
        assert!(matches!(
            cli.command,
            Command::Ask { ref id, ref text, no_stream: false } if id == "c1" && text == "Which valves leaked?"
        ));
        let overrides = cli.overrides();
        assert_eq!(overrides.base_url.as_deref(), Some("http://nav.local/"));
        assert_eq!(overrides.industries, vec!["Chemicals".to_string()]);
    }

    #[test]
    fn log_destination_defaults_to_file() {
        let cli = Cli::parse_from(["incident-nav", "chats"]);
        assert_eq!(cli.log, LogDestination::File);
        assert_eq!(cli.log_level, LevelFilter::Info);
    }
}
