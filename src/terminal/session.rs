//! Persistent shell session: create, execute, reset, close.
//!
//! A [`ShellSession`] keeps one interactive shell alive across many commands
//! so directory changes and exported variables persist. Calls on one session
//! are serialized by an internal async mutex because the framing protocol can
//! only track one outstanding command.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::framing::{self, Framer, Resync};
use super::pty::{PtyProcess, SENTINEL_ENV};
use crate::config::{self, TerminalConfig};
use crate::{AppError, Result};

/// Why waiting for a frame stopped without one.
enum FrameWait {
    Closed,
    TimedOut,
    WriteFailed(std::io::Error),
}

/// Mutable state guarded by the single-flight lock.
#[derive(Debug)]
struct SessionInner {
    process: Option<PtyProcess>,
    framer: Framer,
    sentinel: String,
}

/// Handle to one persistent interactive shell.
#[derive(Debug)]
pub struct ShellSession {
    id: String,
    initial_dir: PathBuf,
    config: TerminalConfig,
    alive: AtomicBool,
    working_dir: RwLock<PathBuf>,
    inner: Mutex<SessionInner>,
}

/// Random sentinel for one shell process.
#[must_use]
pub fn generate_sentinel() -> String {
    format!("__agent_toolbox_{}__", Uuid::new_v4().simple())
}

/// Line typed into a fresh shell to turn off echo and install the sentinel prompt.
#[must_use]
pub fn startup_line() -> String {
    format!("stty -echo 2>/dev/null; PS1=\"${SENTINEL_ENV}\"; PS2=''; unset PROMPT_COMMAND")
}

impl ShellSession {
    /// Start a shell in `initial_dir` and wait until it is ready for commands.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` if `config` is invalid.
    /// - `AppError::Spawn` if the directory is missing or the shell cannot start.
    /// - `AppError::StartupTimeout` if the sentinel prompt never appears.
    /// - Any `execute` error from the initial directory change.
    pub async fn create(initial_dir: impl Into<PathBuf>, config: &TerminalConfig) -> Result<Self> {
        config.validate()?;
        let initial_dir = initial_dir.into();
        let id = Uuid::new_v4().to_string();
        let span = info_span!("shell_create", session_id = %id, initial_dir = %initial_dir.display());

        async move {
            let inner = start_shell(&initial_dir, config).await?;
            let session = Self {
                id,
                working_dir: RwLock::new(initial_dir.clone()),
                initial_dir,
                config: config.clone(),
                alive: AtomicBool::new(true),
                inner: Mutex::new(inner),
            };

            {
                let mut inner = session.inner.lock().await;
                session.enter_initial_dir(&mut inner).await?;
            }

            info!(session_id = %session.id, "shell session ready");
            Ok(session)
        }
        .instrument(span)
        .await
    }

    /// Run `command` and return its cleaned output once the prompt returns.
    ///
    /// A second caller waits until the first command completes or times out.
    ///
    /// # Errors
    ///
    /// - `AppError::CommandTimeout` if the prompt does not return within
    ///   `timeout`; the shell keeps running the command.
    /// - `AppError::SessionTerminated` if the shell has exited.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<String> {
        let span = info_span!("shell_execute", session_id = %self.id);
        async {
            let mut inner = self.inner.lock().await;
            self.execute_locked(&mut inner, command, timeout).await
        }
        .instrument(span)
        .await
    }

    /// Replace the shell with a fresh one in the original directory.
    ///
    /// Exported variables, functions, and directory changes are lost. A new
    /// sentinel is generated unless one is configured.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ShellSession::create`]; on failure the
    /// session stays terminated.
    pub async fn reset(&self) -> Result<()> {
        let span = info_span!("shell_reset", session_id = %self.id);
        async {
            let mut inner = self.inner.lock().await;
            self.alive.store(false, Ordering::Release);
            if let Some(mut process) = inner.process.take() {
                process.kill();
            }

            *inner = start_shell(&self.initial_dir, &self.config).await?;
            self.alive.store(true, Ordering::Release);
            self.set_working_dir(self.initial_dir.clone());

            self.enter_initial_dir(&mut inner).await?;
            info!("shell session reset");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Ask the shell to exit and release its terminal. Safe to call repeatedly.
    pub async fn close(&self) {
        let span = info_span!("shell_close", session_id = %self.id);
        async {
            let mut inner = self.inner.lock().await;
            self.alive.store(false, Ordering::Release);
            if let Some(mut process) = inner.process.take() {
                process.shutdown(self.config.close_grace()).await;
                info!("shell session closed");
            }
        }
        .instrument(span)
        .await;
    }

    /// Session identifier used in logs.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory the session was created in and returns to on reset.
    #[must_use]
    pub fn initial_dir(&self) -> &Path {
        &self.initial_dir
    }

    /// Working directory as of the last successful directory change.
    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the shell is still usable.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Sentinel prompt of the current shell process.
    pub async fn sentinel(&self) -> String {
        self.inner.lock().await.sentinel.clone()
    }

    async fn enter_initial_dir(&self, inner: &mut SessionInner) -> Result<()> {
        let path = self.initial_dir.to_string_lossy();
        let command = format!("cd {}", framing::shell_quote(&path));
        let timeout = self.config.command_timeout();
        self.execute_locked(inner, &command, timeout).await.map(|_| ())
    }

    async fn execute_locked(
        &self,
        inner: &mut SessionInner,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        let output = self.run_framed(inner, command, timeout).await?;

        if framing::changes_directory(command) {
            let pwd = self.run_framed(inner, "pwd", timeout).await?;
            if let Some(dir) = pwd.lines().next_back().map(str::trim).map(PathBuf::from) {
                if dir.is_absolute() {
                    self.set_working_dir(dir);
                }
            }
        }

        Ok(output)
    }

    async fn run_framed(
        &self,
        inner: &mut SessionInner,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        if !self.is_alive() {
            return Err(AppError::SessionTerminated(format!(
                "shell session {} is no longer running; create a new session",
                self.id
            )));
        }
        let Some(process) = inner.process.as_mut() else {
            return Err(AppError::SessionTerminated(format!(
                "shell session {} has no process; create a new session",
                self.id
            )));
        };

        let deadline = Instant::now() + timeout;
        while let Some(chunk) = process.try_recv() {
            inner.framer.push(&chunk);
        }

        if inner.framer.is_desynced() {
            match resync(process, &mut inner.framer, deadline).await {
                Ok(()) => {}
                Err(FrameWait::TimedOut) => {
                    inner.framer.abandon();
                    warn!(command, ?timeout, "shell still busy with an earlier command");
                    return Err(AppError::CommandTimeout(format!(
                        "an earlier command is still running, so `{command}` was not sent \
                         within {timeout:?}. Run a no-op command such as `true` to \
                         resynchronize once it completes, or reset the session"
                    )));
                }
                Err(FrameWait::Closed) => return Err(self.shell_exited(inner, command)),
                Err(FrameWait::WriteFailed(err)) => {
                    self.mark_dead(inner);
                    return Err(AppError::SessionTerminated(format!(
                        "failed to resynchronize the shell: {err}"
                    )));
                }
            }
        }

        inner.framer.begin();
        if let Err(err) = process.write_line(command) {
            self.mark_dead(inner);
            return Err(AppError::SessionTerminated(format!(
                "failed to send `{command}` to the shell: {err}"
            )));
        }

        match await_event(process, &mut inner.framer, deadline, Framer::poll).await {
            Ok(raw) => Ok(framing::clean_output(&raw, command)),
            Err(FrameWait::TimedOut) => {
                inner.framer.abandon();
                warn!(command, ?timeout, "command timed out");
                Err(AppError::CommandTimeout(format!(
                    "`{command}` did not finish within {timeout:?}; the shell is still running it. \
                     Run a no-op command such as `true` to resynchronize once it completes, \
                     or reset the session"
                )))
            }
            Err(FrameWait::Closed | FrameWait::WriteFailed(_)) => {
                Err(self.shell_exited(inner, command))
            }
        }
    }

    fn shell_exited(&self, inner: &mut SessionInner, command: &str) -> AppError {
        self.mark_dead(inner);
        warn!(command, "shell exited while running command");
        AppError::SessionTerminated(format!(
            "the shell exited while running `{command}`; create a new session"
        ))
    }

    fn mark_dead(&self, inner: &mut SessionInner) {
        self.alive.store(false, Ordering::Release);
        inner.process = None;
    }

    fn set_working_dir(&self, dir: PathBuf) {
        *self
            .working_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir;
    }
}

/// Spawn a shell and complete the sentinel handshake.
async fn start_shell(initial_dir: &Path, config: &TerminalConfig) -> Result<SessionInner> {
    if !initial_dir.is_dir() {
        return Err(AppError::Spawn(format!(
            "initial directory {} does not exist or is not a directory",
            initial_dir.display()
        )));
    }

    let sentinel = match &config.sentinel {
        Some(fixed) => {
            config::validate_sentinel(fixed)?;
            fixed.clone()
        }
        None => generate_sentinel(),
    };
    let startup = startup_line();
    if startup.contains(&sentinel) {
        return Err(AppError::Config(format!(
            "sentinel {sentinel:?} collides with the shell startup line"
        )));
    }

    let mut process = PtyProcess::spawn(config, initial_dir, &sentinel)?;
    let mut framer = Framer::new(&sentinel);

    framer.begin();
    process
        .write_line(&startup)
        .map_err(|err| AppError::Spawn(format!("failed to configure shell prompt: {err}")))?;

    let timeout = config.startup_timeout();
    let deadline = Instant::now() + timeout;
    match await_event(&mut process, &mut framer, deadline, Framer::poll).await {
        Ok(_) => Ok(SessionInner {
            process: Some(process),
            framer,
            sentinel,
        }),
        Err(FrameWait::TimedOut) => Err(AppError::StartupTimeout(format!(
            "shell {} did not show its sentinel prompt within {timeout:?}",
            config.shell
        ))),
        Err(FrameWait::Closed | FrameWait::WriteFailed(_)) => Err(AppError::Spawn(format!(
            "shell {} exited during startup",
            config.shell
        ))),
    }
}

/// Type marker commands until the latest one comes back or `deadline` passes.
async fn resync(
    process: &mut PtyProcess,
    framer: &mut Framer,
    deadline: Instant,
) -> std::result::Result<(), FrameWait> {
    loop {
        let nonce = Uuid::new_v4().simple().to_string();
        framer.begin_resync(&nonce);
        process
            .write_line(&framing::marker_command(&nonce))
            .map_err(FrameWait::WriteFailed)?;

        match await_event(process, framer, deadline, Framer::poll_resync).await? {
            Resync::Synced => {
                debug!("shell output resynchronized");
                return Ok(());
            }
            Resync::StalePrompt => {}
        }
    }
}

/// Feed output into `framer` until `poll` yields, the shell exits, or `deadline` passes.
async fn await_event<T>(
    process: &mut PtyProcess,
    framer: &mut Framer,
    deadline: Instant,
    mut poll: impl FnMut(&mut Framer) -> Option<T>,
) -> std::result::Result<T, FrameWait> {
    loop {
        if let Some(event) = poll(framer) {
            return Ok(event);
        }
        match tokio::time::timeout_at(deadline, process.recv()).await {
            Ok(Some(chunk)) => framer.push(&chunk),
            Ok(None) => return Err(FrameWait::Closed),
            Err(_) => return Err(FrameWait::TimedOut),
        }
    }
}
