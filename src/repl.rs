use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::Path;

use crate::commands::Registry;
use crate::error::{CliError, RemoteError};
use crate::session::Session;
use crate::ui;

/// Runs `initial` once, then reads commands until `quit` or end of input.
/// Logs off on the way out.
pub fn run(
    session: &mut Session,
    registry: &mut Registry,
    history_path: &Path,
    initial: Option<&str>,
) -> Result<()> {
    let mut stdout = io::stdout();
    if let Some(line) = initial {
        execute(registry, session, &mut stdout, line);
    }

    // Set up readline
    let mut rl = DefaultEditor::new()?;
    if rl.load_history(history_path).is_err() {
        tracing::debug!(path = ?history_path, "no readline history yet");
    }

    while !session.quit_requested {
        let prompt = ui::prompt(session.current_case.as_ref().map(|c| c.id));
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                execute(registry, session, &mut stdout, line);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("Bye!");
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "readline failed");
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(history_path) {
        tracing::warn!(error = %e, "could not save readline history");
    }
    if let Err(e) = session.logoff() {
        tracing::warn!(error = %e, "logoff failed");
    }
    Ok(())
}

/// Runs one line, reporting any failure instead of propagating it.
pub fn execute(registry: &mut Registry, session: &mut Session, out: &mut dyn Write, line: &str) {
    if let Err(err) = registry.call_line(session, out, line) {
        if let Err(e) = report(out, &err) {
            tracing::warn!(error = %e, "could not report error");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Failure<'e> {
    Aborted,
    Interrupted,
    Refused(&'e str),
    BadHeader(&'e str),
    Other,
}

fn classify(err: &anyhow::Error) -> Failure<'_> {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return match cli {
            CliError::Aborted => Failure::Aborted,
            CliError::Precondition(message) => Failure::Refused(message),
            CliError::MalformedHeader(message) => Failure::BadHeader(message),
            CliError::Remote(RemoteError::Interrupted) => Failure::Interrupted,
            CliError::Remote(_) => Failure::Other,
        };
    }
    match err.downcast_ref::<RemoteError>() {
        Some(RemoteError::Interrupted) => Failure::Interrupted,
        _ => Failure::Other,
    }
}

fn report(out: &mut dyn Write, err: &anyhow::Error) -> io::Result<()> {
    match classify(err) {
        Failure::Aborted => writeln!(out, "Aborted."),
        Failure::Interrupted => Ok(()),
        Failure::Refused(message) => writeln!(out, "{message}"),
        Failure::BadHeader(message) => writeln!(out, "Invalid draft header: {message}"),
        Failure::Other => {
            tracing::error!(error = ?err, "command failed");
            writeln!(out, "{} {:#}", ui::red("Error:"), err)
        }
    }
}
