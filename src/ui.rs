//! Terminal presentation: colors, rules, prompts.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{StyledContent, Stylize};
use crossterm::terminal;
use std::fmt::Display;
use std::io::{self, BufRead, IsTerminal, Write};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR: AtomicBool = AtomicBool::new(false);

/// Enables colors when stdout is a terminal and `NO_COLOR` is unset.
pub fn init() {
    set_color(io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none());
}

pub fn set_color(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
}

fn paint(s: impl Display, style: fn(String) -> StyledContent<String>) -> String {
    let s = s.to_string();
    if COLOR.load(Ordering::Relaxed) {
        style(s).to_string()
    } else {
        s
    }
}

pub fn blue(s: impl Display) -> String {
    paint(s, |s| s.blue())
}

pub fn cyan(s: impl Display) -> String {
    paint(s, |s| s.cyan())
}

pub fn red(s: impl Display) -> String {
    paint(s, |s| s.dark_red())
}

pub fn white(s: impl Display) -> String {
    paint(s, |s| s.white())
}

pub fn yellow(s: impl Display) -> String {
    paint(s, |s| s.dark_yellow())
}

pub fn brown(s: impl Display) -> String {
    paint(s, |s| s.dark_yellow())
}

pub fn green(s: impl Display) -> String {
    paint(s, |s| s.dark_green())
}

pub fn magenta(s: impl Display) -> String {
    paint(s, |s| s.dark_magenta())
}

pub fn darkgray(s: impl Display) -> String {
    paint(s, |s| s.dark_grey())
}

pub fn title(s: impl Display) -> String {
    blue(s)
}

pub fn status(s: &str) -> String {
    let lower = s.trim().to_lowercase();
    if lower.contains("active") {
        green(s)
    } else if lower.contains("testing") {
        yellow(s)
    } else if lower.contains("needs additional") {
        magenta(s)
    } else if lower.contains("resolved") {
        cyan(s)
    } else if lower.contains("closed") {
        darkgray(s)
    } else {
        s.to_string()
    }
}

pub fn priority(s: &str) -> String {
    match s.trim().to_lowercase().as_str() {
        "blocker" | "critical" => paint(s, |s| s.red().bold()),
        "high priority" => paint(s, |s| s.red()),
        "need to fix soon" => red(s),
        "need to fix" => white(s),
        "fix if time" => paint(s, |s| s.grey()),
        "for consideration" => darkgray(s),
        _ => s.to_string(),
    }
}

pub fn case_id(id: u64) -> String {
    paint(format!("[{id}]"), |s| s.cyan().bold())
}

pub fn case_id_padded(id: u64, width: usize) -> String {
    paint(format!("{:>width$}", format!("[{id}]")), |s| s.cyan().bold())
}

pub fn event_id(id: u64) -> String {
    darkgray(format!("[{id}]"))
}

pub fn link_id(index: usize) -> String {
    paint(format!("[{index}]"), |s| s.magenta())
}

pub fn attachment_id(id: u64) -> String {
    paint(format!("[{id}]"), |s| s.green())
}

pub fn tag(s: &str) -> String {
    darkgray(format!("|{s}|"))
}

fn width() -> usize {
    terminal::size().map(|(w, _)| w as usize).unwrap_or(80)
}

pub fn hl1() -> String {
    paint("=".repeat(width()), |s| s.yellow().bold())
}

pub fn hl2() -> String {
    yellow("-".repeat(width()))
}

/// Truncates or pads `s` to exactly `n` characters.
pub fn ltrunc(s: &str, n: usize) -> String {
    let cut: String = s.chars().take(n).collect();
    format!("{cut:<n$}")
}

pub fn prompt(current: Option<u64>) -> String {
    match current {
        Some(id) => cyan(format!("[{id}] >>> ")),
        None => cyan(">>> "),
    }
}

/// Asks a yes/no question; an empty answer means yes.
pub fn confirm(question: &str) -> io::Result<bool> {
    let answer = ask(&format!("{question} [Y/n] "))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes"))
}

pub fn ask(question: &str) -> io::Result<String> {
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Reads a line without echoing it.
pub fn ask_password(question: &str) -> io::Result<String> {
    if !io::stdin().is_terminal() {
        return ask(question);
    }
    print!("{question}");
    io::stdout().flush()?;
    terminal::enable_raw_mode()?;
    let result = read_hidden();
    terminal::disable_raw_mode()?;
    println!();
    result
}

fn read_hidden() -> io::Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(password),
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(io::ErrorKind::Interrupted.into());
                }
                KeyCode::Char(c) => password.push(c),
                _ => {}
            }
        }
    }
}

/// Opens `url` with `browser`, or says how to configure one.
pub fn browse(out: &mut dyn Write, browser: Option<&str>, url: &str) -> Result<()> {
    let Some(browser) = browser else {
        writeln!(out, "Set $BROWSER first")?;
        return Ok(());
    };
    tracing::debug!(browser, url, "opening browser");
    let status = Command::new(browser)
        .arg(url)
        .status()
        .with_context(|| format!("Failed to start browser: {}", browser))?;
    if !status.success() {
        writeln!(out, "Browser exited with error")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ltrunc() {
        assert_eq!(ltrunc("Active", 8), "Active  ");
        assert_eq!(ltrunc("Resolved (Fixed)", 8), "Resolved");
        assert_eq!(ltrunc("Ünïcödé", 3), "Ünï");
    }

    #[test]
    fn test_plain_output_without_color() {
        set_color(false);
        assert_eq!(case_id(12), "[12]");
        assert_eq!(case_id_padded(12, 6), "  [12]");
        assert_eq!(tag("ui"), "|ui|");
        assert_eq!(status("Active"), "Active");
    }
}
