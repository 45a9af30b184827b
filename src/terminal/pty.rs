//! Shell process attached to a pseudo-terminal.
//!
//! The PTY master is read on a dedicated OS thread that forwards chunks over
//! a bounded channel. When the shell exits the read fails, the thread ends,
//! and the channel closes; that is how a dead shell is observed.
//!
//! Dropping a [`PtyProcess`] kills the shell if it is still running, so a
//! session that is never closed does not leave an orphaned process behind.

use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TerminalConfig;
use crate::{AppError, Result};

/// Environment variable carrying the sentinel into the shell.
///
/// The startup line assigns `PS1` from this variable so the line itself,
/// which the terminal may echo, never contains the sentinel text.
pub const SENTINEL_ENV: &str = "AGENT_TOOLBOX_PS1";

const READ_CHUNK_BYTES: usize = 4096;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running shell and the I/O handles of its terminal.
pub struct PtyProcess {
    // Held so the terminal stays open for the shell's lifetime.
    _master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output: mpsc::Receiver<Vec<u8>>,
    pid: Option<u32>,
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess").field("pid", &self.pid).finish_non_exhaustive()
    }
}

impl PtyProcess {
    /// Spawn the configured shell on a fresh PTY in `cwd`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the PTY cannot be opened, the shell
    /// cannot be started, or the terminal handles cannot be taken.
    pub fn spawn(config: &TerminalConfig, cwd: &Path, sentinel: &str) -> Result<Self> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| AppError::Spawn(format!("failed to open pty: {err}")))?;

        let mut cmd = CommandBuilder::new(&config.shell);
        for arg in &config.shell_args {
            cmd.arg(arg);
        }
        cmd.cwd(cwd);
        cmd.env("TERM", "dumb");
        cmd.env(SENTINEL_ENV, sentinel);

        let child = pair.slave.spawn_command(cmd).map_err(|err| {
            AppError::Spawn(format!("failed to spawn shell {}: {err}", config.shell))
        })?;
        // The shell owns the slave side now; keeping ours open would hide its exit.
        drop(pair.slave);

        let pid = child.process_id();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| AppError::Spawn(format!("failed to clone pty reader: {err}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| AppError::Spawn(format!("failed to take pty writer: {err}")))?;

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        spawn_reader_thread(reader, tx)?;

        info!(pid = pid.unwrap_or(0), shell = %config.shell, "shell spawned");

        Ok(Self {
            _master: pair.master,
            child,
            writer,
            output: rx,
            pid,
        })
    }

    /// OS process id of the shell, when the platform reports one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Type `line` followed by a newline into the terminal.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the terminal is gone.
    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Next chunk of terminal output, or `None` once the shell has exited.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    /// Next chunk already waiting, without blocking.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.output.try_recv().ok()
    }

    /// Whether the shell process has exited.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)) | Err(_))
    }

    /// Kill the shell without waiting for it to finish anything, then reap it.
    pub fn kill(&mut self) {
        if self.has_exited() {
            return;
        }
        let pid = self.pid.unwrap_or(0);
        if let Err(err) = self.child.kill() {
            warn!(pid, %err, "failed to kill shell");
            return;
        }
        // A killed child exits at once; waiting keeps it from lingering as a zombie.
        match self.child.wait() {
            Ok(status) => debug!(pid, exit_code = status.exit_code(), "shell reaped"),
            Err(err) => warn!(pid, %err, "failed to reap shell"),
        }
    }

    /// Ask the shell to `exit`, wait up to `grace`, then force-kill it.
    pub async fn shutdown(&mut self, grace: Duration) {
        let pid = self.pid.unwrap_or(0);

        if let Err(err) = self.write_line("exit") {
            debug!(pid, %err, "shell did not accept exit; killing");
            self.kill();
            return;
        }

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    info!(pid, exit_code = status.exit_code(), "shell exited gracefully");
                    return;
                }
                Ok(None) if Instant::now() < deadline => {
                    tokio::time::sleep(EXIT_POLL_INTERVAL).await;
                }
                Ok(None) => {
                    warn!(pid, "shell did not exit within grace period, forcing kill");
                    break;
                }
                Err(err) => {
                    warn!(pid, %err, "error waiting for shell");
                    break;
                }
            }
        }
        self.kill();
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Forward everything read from `reader` into `tx` until EOF or error.
fn spawn_reader_thread(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<()> {
    thread::Builder::new()
        .name("pty-reader".into())
        .spawn(move || {
            let mut buffer = [0u8; READ_CHUNK_BYTES];
            loop {
                match reader.read(&mut buffer) {
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    // EOF, or EIO once the last slave handle closes on Linux.
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.blocking_send(buffer[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        })
        .map(|_| ())
        .map_err(|err| AppError::Spawn(format!("failed to start pty reader thread: {err}")))
}
