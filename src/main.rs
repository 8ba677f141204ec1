mod builtins;
mod case;
mod catalog;
mod commands;
mod config;
mod editor;
mod error;
mod fogbugz;
mod history;
mod links;
mod person;
mod remote;
mod repl;
mod search;
mod session;
#[cfg(test)]
mod testing;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::editor::ScratchEditor;
use crate::fogbugz::{Credentials, FogBugz};
use crate::session::Session;

#[derive(Parser)]
#[command(name = "fbcli")]
#[command(about = "Interactive command line client for FogBugz")]
struct Cli {
    /// Config file (defaults to ~/.config/fbcli/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
    /// Command to run once before the prompt, e.g. `fbcli show 1234`
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env("FBCLI_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "fbcli=debug,warn" } else { "fbcli=warn" })
    });
    let registry = tracing_subscriber::registry().with(filter);
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            registry
                .with(fmt::layer().compact().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_file.as_deref())?;
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(?path, "loaded environment file");
    }
    ui::init();

    let config = config::load_config(cli.config.as_deref())?;
    let credentials = Credentials::from_config_or_ask(&config.remote)?;
    let client = FogBugz::new(credentials, Duration::from_secs(config.remote.timeout_secs))?;
    let drafts = ScratchEditor::new(
        config.editor.scratch_file.clone(),
        config.editor.command.clone(),
    );
    let mut session = Session::new(Box::new(client), Box::new(drafts))
        .with_browser(config.repl.browser.clone())
        .with_top(config.repl.top);
    let mut registry = builtins::default_registry(&config.aliases);

    session.login().context("Could not log in")?;

    let history_file = config.history_file()?;
    if config.repl.history_file.is_none() {
        config::ensure_config_dir()?;
    }
    let initial = (!cli.command.is_empty()).then(|| cli.command.join(" "));
    repl::run(&mut session, &mut registry, &history_file, initial.as_deref())
}
