//! Error types shared across the application.
//!
//! Every message is written for the agent that issued the call: it names the
//! offending path or value so the caller can correct its input and retry.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The shell process could not be started.
    Spawn(String),
    /// The shell never displayed the sentinel prompt during startup.
    StartupTimeout(String),
    /// A command did not finish before its deadline; the shell keeps running it.
    CommandTimeout(String),
    /// The shell process is gone; the session must be discarded.
    SessionTerminated(String),
    /// Target path does not exist.
    NotFound(String),
    /// Target path exists but is not a regular file.
    NotAFile(String),
    /// A line range is malformed (end before start, wrong arity).
    InvalidRange(String),
    /// A line number lies outside the file.
    OutOfBounds(String),
    /// The search text does not occur in the file.
    PatternNotFound(String),
    /// A path failed the adapter's shape checks.
    PathViolation(String),
    /// A tool call is missing arguments or names an unknown command.
    InvalidArguments(String),
    /// A request line on the stdio front end could not be decoded.
    Protocol(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::StartupTimeout(msg) => write!(f, "startup timeout: {msg}"),
            Self::CommandTimeout(msg) => write!(f, "command timeout: {msg}"),
            Self::SessionTerminated(msg) => write!(f, "session terminated: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::NotAFile(msg) => write!(f, "not a file: {msg}"),
            Self::InvalidRange(msg) => write!(f, "invalid range: {msg}"),
            Self::OutOfBounds(msg) => write!(f, "out of bounds: {msg}"),
            Self::PatternNotFound(msg) => write!(f, "pattern not found: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether the failure leaves a shell session unusable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionTerminated(_))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
