//! Composing comments and tickets in `$EDITOR`.
//!
//! The scratch file holds an optional YAML header, a `---` separator and
//! a body. It is kept when a command fails, so the text can be reused on
//! the next attempt, and removed once the command succeeds or the user
//! aborts.

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::CliError;
use crate::remote::Upload;

pub const SEPARATOR: &str = "---";
const COMMENT_CHAR: char = '#';
pub const DEFAULT_HEADER: &str = "\n";
pub const FOOTER: &str = "# Lines starting with \"#\" will be ignored.
# Leave this file empty to abort action.
# It's possible to add metadata in the format of a header.
# Use \"---\" as separator between the header and the body.
# E.g. To upload files use:
#    Files:
#      - path_to_file_1
#      - path_to_file_2
";

/// Text read back from the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    header: Option<String>,
    raw_body: String,
}

impl Draft {
    /// Splits at the first line that is exactly `---` (ignoring
    /// surrounding whitespace). Without one, everything is body.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        match lines.iter().position(|l| l.trim() == SEPARATOR) {
            Some(sep) => Self {
                header: Some(lines[..sep].join("\n")),
                raw_body: lines[sep + 1..].join("\n"),
            },
            None => Self {
                header: None,
                raw_body: text.to_string(),
            },
        }
    }

    #[cfg(test)]
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// The body without comment lines or surrounding blank lines. Below a
    /// header, indented `#` lines count as comments too.
    pub fn body(&self) -> String {
        let indented = self.header.is_some();
        self.raw_body
            .lines()
            .filter(|l| {
                let l = if indented { l.trim_start() } else { l };
                !l.starts_with(COMMENT_CHAR)
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches('\n')
            .to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.body().trim().is_empty()
    }

    pub fn abort_if_empty(&self) -> Result<(), CliError> {
        if self.is_empty() {
            return Err(CliError::Aborted);
        }
        Ok(())
    }

    pub fn meta(&self) -> Result<Meta, CliError> {
        let Some(header) = self.header.as_deref() else {
            return Ok(Meta::default());
        };
        match serde_yaml::from_str::<Value>(header) {
            Ok(Value::Null) => Ok(Meta::default()),
            Ok(Value::Mapping(map)) => Ok(Meta(map)),
            Ok(_) => Err(CliError::MalformedHeader(
                "expected \"Key: value\" lines".into(),
            )),
            Err(e) => Err(CliError::MalformedHeader(e.to_string())),
        }
    }

    /// Reads every file listed under `Files` in the header.
    pub fn files(&self) -> Result<Vec<Upload>> {
        self.meta()?
            .list("Files")
            .iter()
            .map(|path| read_upload(Path::new(path)))
            .collect()
    }
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read attachment: {:?}", path))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload { file_name, bytes })
}

/// Parsed draft header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta(Mapping);

impl Meta {
    /// A scalar field as text; missing and null fields are `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar)
    }

    /// A list field; a single scalar counts as a one-item list.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar).collect(),
            Some(value) => scalar(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Where drafts come from.
pub trait DraftEditor {
    /// Lets the user write a draft below `header`.
    fn write(&mut self, header: &str) -> Result<Draft>;
    /// Asks `question` first; `None` when the user declines.
    fn maybe_write(&mut self, question: &str, header: &str) -> Result<Option<Draft>>;
    /// Forgets any saved draft.
    fn clear(&mut self) -> Result<()>;
}

type Confirm = Box<dyn FnMut(&str) -> io::Result<bool>>;

/// Runs an external editor on a scratch file.
pub struct ScratchEditor {
    path: PathBuf,
    command: String,
    confirm: Confirm,
}

impl ScratchEditor {
    pub fn new(path: PathBuf, command: String) -> Self {
        Self::with_confirm(path, command, Box::new(crate::ui::confirm))
    }

    pub fn with_confirm(path: PathBuf, command: String, confirm: Confirm) -> Self {
        Self {
            path,
            command,
            confirm,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run_editor(&self) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            bail!("No editor configured. Set $EDITOR.");
        };
        tracing::debug!(editor = %self.command, path = ?self.path, "opening editor");
        let status = Command::new(program)
            .args(parts)
            .arg(&self.path)
            .status()
            .with_context(|| format!("Failed to open editor: {}", self.command))?;
        if !status.success() {
            bail!("Editor exited with error");
        }
        Ok(())
    }
}

impl DraftEditor for ScratchEditor {
    fn write(&mut self, header: &str) -> Result<Draft> {
        let mut reuse = false;
        if self.path.exists() {
            if (self.confirm)("Comment file already exists. Reuse?")? {
                reuse = true;
            } else {
                self.clear()?;
            }
        }
        if !reuse {
            fs::write(&self.path, format!("{header}{FOOTER}"))
                .with_context(|| format!("Failed to write draft: {:?}", self.path))?;
        }

        self.run_editor()?;

        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read draft: {:?}", self.path))?;
        Ok(Draft::parse(&text))
    }

    fn maybe_write(&mut self, question: &str, header: &str) -> Result<Option<Draft>> {
        if (self.confirm)(question)? {
            self.write(header).map(Some)
        } else {
            Ok(None)
        }
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Failed to remove draft: {:?}", self.path))
            }
            _ => Ok(()),
        }
    }
}

/// Clears the saved draft unless `outcome` failed for a reason other than
/// the user aborting.
pub fn settle<T>(editor: &mut dyn DraftEditor, outcome: Result<T>) -> Result<T> {
    let keep = match &outcome {
        Ok(_) => false,
        Err(e) => !matches!(e.downcast_ref::<CliError>(), Some(CliError::Aborted)),
    };
    if keep {
        tracing::debug!("keeping draft for the next attempt");
    } else if let Err(e) = editor.clear() {
        tracing::warn!(error = %e, "could not clear draft");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn editor_in(dir: &TempDir, command: &str, reuse: bool) -> ScratchEditor {
        ScratchEditor::with_confirm(
            dir.path().join(".fbcli_comment"),
            command.to_string(),
            Box::new(move |_| Ok(reuse)),
        )
    }

    #[test]
    fn test_meta_and_body() {
        let draft = Draft::parse(
            "Title: Valid title\nProject: Proj\nArea: misc\nAssign to: me\nPriority: high\n---\nThis is the body",
        );
        let meta = draft.meta().unwrap();
        assert_eq!(meta.get("Title").as_deref(), Some("Valid title"));
        assert_eq!(meta.get("Assign to").as_deref(), Some("me"));
        assert_eq!(meta.get("Priority").as_deref(), Some("high"));
        assert_eq!(draft.body(), "This is the body");
    }

    #[test]
    fn test_invalid_header_is_malformed() {
        let draft = Draft::parse(
            "Title:Invalid because no space after colon\nProject:Proj\nAssign to: me\n---\nbody",
        );
        assert!(matches!(draft.meta(), Err(CliError::MalformedHeader(_))));
    }

    #[test]
    fn test_no_separator_means_no_header() {
        let draft = Draft::parse("Just a comment\n# hidden\nsecond line\n");
        assert_eq!(draft.header(), None);
        assert!(draft.meta().unwrap().is_empty());
        assert_eq!(draft.body(), "Just a comment\nsecond line");
    }

    #[test]
    fn test_indented_comments_below_header() {
        let draft = Draft::parse("Title: x\n---\n  # note to self\nkeep\n    indented text\n");
        assert_eq!(draft.body(), "keep\n    indented text");
        let plain = Draft::parse("  # not a comment\nkeep\n");
        assert_eq!(plain.body(), "  # not a comment\nkeep");
    }

    #[test]
    fn test_utf8_body() {
        let draft = Draft::parse("Title: Some ¢hars\n---\nThis is the body with mo®e utf8.\n");
        assert_eq!(draft.meta().unwrap().get("Title").as_deref(), Some("Some ¢hars"));
        assert_eq!(draft.body(), "This is the body with mo®e utf8.");
    }

    #[test]
    fn test_only_comments_is_empty_and_aborts() {
        let draft = Draft::parse(&format!("\n\n{FOOTER}\n# more\n"));
        assert!(draft.is_empty());
        assert!(matches!(draft.abort_if_empty(), Err(CliError::Aborted)));
    }

    #[test]
    fn test_files_are_read_from_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.log");
        fs::write(&path, "boom").unwrap();
        let draft = Draft::parse(&format!("Files:\n  - {}\n---\nsee attached", path.display()));

        let files = draft.files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "trace.log");
        assert_eq!(files[0].bytes, b"boom");
    }

    #[test]
    fn test_write_new_draft() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor_in(&dir, "true", false);

        let draft = editor.write(DEFAULT_HEADER).unwrap();

        assert!(draft.is_empty());
        let on_disk = fs::read_to_string(editor.path()).unwrap();
        assert_eq!(on_disk, format!("\n{FOOTER}"));
    }

    #[test]
    fn test_write_reuses_existing_draft() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor_in(&dir, "true", true);
        fs::write(editor.path(), "saved text\n").unwrap();

        let draft = editor.write(DEFAULT_HEADER).unwrap();
        assert_eq!(draft.body(), "saved text");
    }

    #[test]
    fn test_write_discards_existing_draft_when_declined() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor_in(&dir, "true", false);
        fs::write(editor.path(), "saved text\n").unwrap();

        let draft = editor.write(DEFAULT_HEADER).unwrap();
        assert!(draft.is_empty());
    }

    #[test]
    fn test_maybe_write_declined() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor_in(&dir, "true", false);
        assert!(editor.maybe_write("Add a comment?", DEFAULT_HEADER).unwrap().is_none());
        assert!(!editor.path().exists());
    }

    #[test]
    fn test_failing_editor_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor_in(&dir, "false", false);
        assert!(editor.write(DEFAULT_HEADER).is_err());
    }

    #[test]
    fn test_settle_keeps_draft_only_on_real_errors() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor_in(&dir, "true", false);

        fs::write(editor.path(), "x").unwrap();
        let failed: Result<()> = Err(anyhow::anyhow!("server said no"));
        assert!(settle(&mut editor, failed).is_err());
        assert!(editor.path().exists());

        let aborted: Result<()> = Err(CliError::Aborted.into());
        assert!(settle(&mut editor, aborted).is_err());
        assert!(!editor.path().exists());

        fs::write(editor.path(), "x").unwrap();
        settle(&mut editor, Ok(())).unwrap();
        assert!(!editor.path().exists());
    }
}
