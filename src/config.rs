//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Characters a shell would interpret when expanding a prompt string.
const PROMPT_METACHARACTERS: &[char] = &['\\', '$', '`', '"', '\'', '!', '%'];

/// Settings for the persistent shell session.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TerminalConfig {
    /// Shell binary launched on the pseudo-terminal.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Arguments passed to the shell.
    #[serde(default = "default_shell_args")]
    pub shell_args: Vec<String>,
    /// Deadline for the first sentinel prompt after spawning.
    #[serde(default = "default_startup_timeout_seconds")]
    pub startup_timeout_seconds: u64,
    /// Default per-command deadline used by the tool adapter.
    #[serde(default = "default_command_timeout_seconds")]
    pub command_timeout_seconds: u64,
    /// How long `close` waits for `exit` before force-killing the shell.
    #[serde(default = "default_close_grace_seconds")]
    pub close_grace_seconds: u64,
    /// Fixed sentinel prompt; a fresh random one is generated per session when unset.
    #[serde(default)]
    pub sentinel: Option<String>,
    /// Pseudo-terminal height.
    #[serde(default = "default_rows")]
    pub rows: u16,
    /// Pseudo-terminal width.
    #[serde(default = "default_cols")]
    pub cols: u16,
}

fn default_shell() -> String {
    "/bin/bash".into()
}

fn default_shell_args() -> Vec<String> {
    vec!["--noprofile".into(), "--norc".into(), "--noediting".into()]
}

fn default_startup_timeout_seconds() -> u64 {
    5
}

fn default_command_timeout_seconds() -> u64 {
    30
}

fn default_close_grace_seconds() -> u64 {
    2
}

fn default_rows() -> u16 {
    24
}

fn default_cols() -> u16 {
    200
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_args: default_shell_args(),
            startup_timeout_seconds: default_startup_timeout_seconds(),
            command_timeout_seconds: default_command_timeout_seconds(),
            close_grace_seconds: default_close_grace_seconds(),
            sentinel: None,
            rows: default_rows(),
            cols: default_cols(),
        }
    }
}

impl TerminalConfig {
    /// Deadline for the startup handshake.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }

    /// Default deadline for a single command.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    /// Grace period granted to `exit` on close.
    #[must_use]
    pub fn close_grace(&self) -> Duration {
        Duration::from_secs(self.close_grace_seconds)
    }

    /// Check the terminal settings for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(AppError::Config("terminal.shell must not be empty".into()));
        }
        if self.startup_timeout_seconds == 0 {
            return Err(AppError::Config(
                "terminal.startup_timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.command_timeout_seconds == 0 {
            return Err(AppError::Config(
                "terminal.command_timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(AppError::Config(
                "terminal.rows and terminal.cols must be greater than zero".into(),
            ));
        }
        if let Some(sentinel) = &self.sentinel {
            validate_sentinel(sentinel)?;
        }
        Ok(())
    }
}

/// Reject sentinels the shell would rewrite or that are too easy to collide with.
///
/// # Errors
///
/// Returns `AppError::Config` describing why the sentinel is unusable.
pub fn validate_sentinel(sentinel: &str) -> Result<()> {
    if sentinel.len() < 8 {
        return Err(AppError::Config(format!(
            "sentinel {sentinel:?} is too short; use at least 8 characters"
        )));
    }
    if sentinel.chars().any(char::is_whitespace) {
        return Err(AppError::Config(format!(
            "sentinel {sentinel:?} must not contain whitespace"
        )));
    }
    if let Some(bad) = sentinel.chars().find(|c| PROMPT_METACHARACTERS.contains(c)) {
        return Err(AppError::Config(format!(
            "sentinel {sentinel:?} contains prompt metacharacter {bad:?}"
        )));
    }
    if sentinel.chars().any(char::is_control) {
        return Err(AppError::Config(format!(
            "sentinel {sentinel:?} must not contain control characters"
        )));
    }
    Ok(())
}

/// Settings for the tool adapter.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    /// Tool results longer than this are truncated before being returned.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_max_output_bytes() -> usize {
    100_000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory the shell session starts in and relative paths are suggested against.
    pub default_workspace_root: PathBuf,
    /// Shell session settings.
    #[serde(default)]
    pub terminal: TerminalConfig,
    /// Tool adapter settings.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration rooted at `workspace_root`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the workspace root cannot be canonicalized.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self {
            default_workspace_root: workspace_root.into(),
            terminal: TerminalConfig::default(),
            tools: ToolsConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Absolute path to the default workspace root.
    #[must_use]
    pub fn default_workspace_root(&self) -> &Path {
        &self.default_workspace_root
    }

    fn validate(&mut self) -> Result<()> {
        self.terminal.validate()?;

        if self.tools.max_output_bytes == 0 {
            return Err(AppError::Config(
                "tools.max_output_bytes must be greater than zero".into(),
            ));
        }

        let canonical_root = self
            .default_workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("default_workspace_root invalid: {err}")))?;
        if !canonical_root.is_dir() {
            return Err(AppError::Config(format!(
                "default_workspace_root {} is not a directory",
                canonical_root.display()
            )));
        }
        self.default_workspace_root = canonical_root;

        Ok(())
    }
}
