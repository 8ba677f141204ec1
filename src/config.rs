use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// fbcli configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub repl: ReplConfig,
    /// Extra aliases: `name = ["command", "arg", ...]`
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Tracker URL, e.g. https://example.fogbugz.com/
    pub url: Option<String>,
    /// Login e-mail
    pub user: Option<String>,
    /// API token; when set, no password is needed
    pub token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Editor command for drafts
    #[serde(default = "default_editor")]
    pub command: String,
    /// Scratch file for drafts
    #[serde(default = "default_scratch_file")]
    pub scratch_file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Readline history file (defaults to history.txt in the config dir)
    pub history_file: Option<PathBuf>,
    /// Browser command for `browse`, `link` and `attachment`
    pub browser: Option<String>,
    /// Number of cases listed by `top`
    #[serde(default = "default_top")]
    pub top: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_editor() -> String {
    "vim".to_string()
}

fn default_scratch_file() -> PathBuf {
    std::env::temp_dir().join(".fbcli_comment")
}

fn default_top() -> u32 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            browser: None,
            top: default_top(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: default_editor(),
            scratch_file: default_scratch_file(),
        }
    }
}

impl Config {
    /// Lets `FBURL`, `FBUSER`, `FBTOKEN`, `EDITOR` and `BROWSER` override
    /// the file.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("FBURL") {
            self.remote.url = Some(url);
        }
        if let Some(user) = var("FBUSER") {
            self.remote.user = Some(user);
        }
        if let Some(token) = var("FBTOKEN") {
            self.remote.token = Some(token);
        }
        if let Some(editor) = var("EDITOR") {
            self.editor.command = editor;
        }
        if let Some(browser) = var("BROWSER") {
            self.repl.browser = Some(browser);
        }
    }

    pub fn history_file(&self) -> Result<PathBuf> {
        match &self.repl.history_file {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("history.txt")),
        }
    }
}

/// Returns the fbcli config directory (~/.config/fbcli/)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("fbcli");
    Ok(config_dir)
}

/// Returns the config file path (~/.config/fbcli/config.toml)
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Ensures the config directory exists
pub fn ensure_config_dir() -> Result<()> {
    let config = config_dir()?;
    std::fs::create_dir_all(&config)
        .with_context(|| format!("Failed to create config directory: {:?}", config))?;
    Ok(())
}

/// Loads the config from `path` (or the default location), falling back
/// to defaults when the file doesn't exist, then applies the environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file()?,
    };

    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.repl.top, 10);
        assert_eq!(config.editor.command, "vim");
        assert!(config.editor.scratch_file.ends_with(".fbcli_comment"));
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.remote.url = Some("https://example.fogbugz.com/".into());
        config
            .aliases
            .insert("mine".into(), vec!["search".into(), "assignedTo:me".into()]);
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.remote.url, config.remote.url);
        assert_eq!(deserialized.aliases["mine"], vec!["search", "assignedTo:me"]);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[remote]\nuser = \"ann@example.com\"\n").unwrap();
        assert_eq!(config.remote.user.as_deref(), Some("ann@example.com"));
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.repl.top, 10);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut config: Config = toml::from_str("[editor]\ncommand = \"nano\"\n").unwrap();
        config.apply_vars(|key| match key {
            "EDITOR" => Some("hx".to_string()),
            "FBTOKEN" => Some("t0k3n".to_string()),
            _ => None,
        });
        assert_eq!(config.editor.command, "hx");
        assert_eq!(config.remote.token.as_deref(), Some("t0k3n"));
        assert_eq!(config.remote.url, None);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.repl.top, 10);
    }
}
