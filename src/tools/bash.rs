//! `bash` tool: run commands in one keep-alive shell session.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::TerminalConfig;
use crate::terminal::ShellSession;
use crate::{AppError, Result};

/// Raw arguments of a `bash` call.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BashArgs {
    /// Command line typed into the shell.
    pub command: String,
    /// Replace the shell with a fresh one at the workspace root before running.
    #[serde(default)]
    pub reset_cwd: bool,
    /// Per-call deadline; the configured default applies when absent.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl BashArgs {
    /// Deadline for this call.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArguments` if `timeout_seconds` is zero.
    pub fn timeout(&self, config: &TerminalConfig) -> Result<Duration> {
        match self.timeout_seconds {
            Some(0) => Err(AppError::InvalidArguments(
                "timeout_seconds must be greater than zero".into(),
            )),
            Some(seconds) => Ok(Duration::from_secs(seconds)),
            None => Ok(config.command_timeout()),
        }
    }
}

/// Run one `bash` call against the session held in `slot`.
///
/// The session is created on first use at `workspace_root`. A session whose
/// shell has exited is closed and replaced before the command runs.
///
/// # Errors
///
/// Propagates session creation, reset and execution errors.
pub async fn run(
    args: &BashArgs,
    slot: &Mutex<Option<ShellSession>>,
    workspace_root: &Path,
    config: &TerminalConfig,
) -> Result<String> {
    let timeout = args.timeout(config)?;
    let mut guard = slot.lock().await;

    let session = match guard.take() {
        Some(session) if session.is_alive() => {
            if args.reset_cwd {
                session.reset().await?;
            }
            session
        }
        Some(stale) => {
            warn!(session_id = stale.id(), "replacing terminated shell session");
            stale.close().await;
            start_session(workspace_root, config).await?
        }
        None => start_session(workspace_root, config).await?,
    };

    let result = session.execute(&args.command, timeout).await;
    if !matches!(&result, Err(err) if err.is_terminal()) {
        *guard = Some(session);
    }
    result.map(|output| format!("```\n{output}\n```"))
}

async fn start_session(workspace_root: &Path, config: &TerminalConfig) -> Result<ShellSession> {
    let session = ShellSession::create(workspace_root, config).await?;
    info!(session_id = session.id(), "keep-alive shell session started");
    Ok(session)
}
