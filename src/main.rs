#![forbid(unsafe_code)]

//! `agent-toolbox`: serves `bash` and `text_editor` tool calls over stdio.
//!
//! Reads newline-delimited JSON requests from stdin and writes one response
//! line per request to stdout. Logs go to stderr so they never mix with
//! responses.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_toolbox::config::GlobalConfig;
use agent_toolbox::rpc;
use agent_toolbox::{AppError, Result, Toolbox};

const STDIN_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-toolbox", about = "Shell and text editor tools over stdio", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the workspace root the shell starts in.
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-toolbox bootstrap");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let result = runtime.block_on(run(args));
    // A pending stdin read sits on a blocking thread and would hold up a plain drop.
    runtime.shutdown_timeout(STDIN_SHUTDOWN_GRACE);
    result
}

async fn run(args: Cli) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        workspace_root = %config.default_workspace_root().display(),
        shell = %config.terminal.shell,
        "configuration loaded"
    );

    let toolbox = Toolbox::new(Arc::new(config));

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    info!("ready for requests on stdin");
    let served = rpc::serve(&toolbox, tokio::io::stdin(), tokio::io::stdout(), ct).await;
    if let Err(err) = &served {
        error!(%err, "request loop failed");
    }

    toolbox.shutdown().await;
    signal_handle.abort();
    info!("agent-toolbox shut down");

    served
}

fn load_config(args: &Cli) -> Result<GlobalConfig> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|err| AppError::Config(format!("cannot read current directory: {err}")))?;
            GlobalConfig::for_workspace(cwd)?
        }
    };

    if let Some(ws) = &args.workspace {
        let canonical = ws
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid workspace override: {err}")))?;
        if !canonical.is_dir() {
            return Err(AppError::Config(format!(
                "workspace override {} is not a directory",
                canonical.display()
            )));
        }
        config.default_workspace_root = canonical;
    }

    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
