//! `incident-nav`: terminal client for the Incident Navigator assistant.
mod cli;
mod commands;
mod platform;

use std::process;

use anyhow::Context;
use clap::Parser;
use navigator_logging::{nav_error, nav_info};

use crate::cli::Cli;
use crate::commands::Runner;
use crate::platform::config::{config_path, AppConfig};

fn main() {
    let cli = Cli::parse();
    platform::logging::initialize(cli.log, cli.log_level);

    if let Err(error) = run(cli) {
        nav_error!("incident-nav failed: {:#}", error);
        eprintln!("Error: {error:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    nav_info!("incident-nav {} starting", env!("CARGO_PKG_VERSION"));
    let path = config_path(cli.config.as_deref(), &cli.state_dir);
    let config = AppConfig::load(&path)?
        .apply(cli.overrides())
        .context("invalid configuration")?;
    nav_info!(
        "Backend {} completions at {}",
        config.base_url,
        config.completion_path
    );

    let mut runner = Runner::new(config, cli.state_dir.clone())?;
    runner.run(cli.command)
}
