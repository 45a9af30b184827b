//! Tool adapter: turns agent tool calls into session and editor operations.
//!
//! Every call produces text. Failures are rendered as `Error: <message>` with
//! [`ToolOutput::is_error`] set so the agent can read the message and retry;
//! nothing is thrown past this layer.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::terminal::ShellSession;
use crate::{AppError, Result};

pub mod bash;
pub mod path_safety;
pub mod text_editor;
pub mod util;

pub use bash::BashArgs;
pub use text_editor::{EditorCommand, TextEditorArgs};

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    /// Run a command in the keep-alive shell.
    Bash(BashArgs),
    /// Operate on a file.
    TextEditor(TextEditorArgs),
}

impl ToolCall {
    /// Decode a call from its tool name and JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArguments` for an unknown tool or arguments
    /// that do not match the tool's shape.
    pub fn from_parts(tool: &str, arguments: Value) -> Result<Self> {
        let decode_error =
            |err: serde_json::Error| AppError::InvalidArguments(format!("{tool}: {err}"));
        match tool {
            "bash" => serde_json::from_value(arguments)
                .map(Self::Bash)
                .map_err(decode_error),
            "text_editor" => serde_json::from_value(arguments)
                .map(Self::TextEditor)
                .map_err(decode_error),
            other => Err(AppError::InvalidArguments(format!(
                "unknown tool `{other}`; expected bash or text_editor"
            ))),
        }
    }

    /// Tool name as exposed to agents.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bash(_) => "bash",
            Self::TextEditor(_) => "text_editor",
        }
    }
}

/// Text returned to the agent for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Result or error text.
    pub text: String,
    /// Whether `text` describes a failure.
    pub is_error: bool,
}

impl ToolOutput {
    fn from_result(result: Result<String>, max_bytes: usize) -> Self {
        let (text, is_error) = match result {
            Ok(text) => (text, false),
            Err(err) => (format!("Error: {err}"), true),
        };
        Self {
            text: util::truncate_output(&text, max_bytes),
            is_error,
        }
    }
}

/// Owns the keep-alive shell and dispatches tool calls.
#[derive(Debug)]
pub struct Toolbox {
    config: Arc<GlobalConfig>,
    shell: Mutex<Option<ShellSession>>,
}

impl Toolbox {
    /// Create a toolbox; the shell session starts on the first `bash` call.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>) -> Self {
        Self {
            config,
            shell: Mutex::new(None),
        }
    }

    /// Configuration this toolbox runs with.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Run one call and render its result.
    pub async fn call(&self, call: ToolCall) -> ToolOutput {
        let span = info_span!("tool_call", tool = call.name());
        let root = self.config.default_workspace_root();
        let result = async {
            match &call {
                ToolCall::Bash(args) => {
                    bash::run(args, &self.shell, root, &self.config.terminal).await
                }
                ToolCall::TextEditor(args) => text_editor::run(args, root),
            }
        }
        .instrument(span)
        .await;

        if let Err(err) = &result {
            warn!(tool = call.name(), %err, "tool call failed");
        }
        ToolOutput::from_result(result, self.config.tools.max_output_bytes)
    }

    /// Decode and run a call given as a tool name plus JSON arguments.
    pub async fn call_raw(&self, tool: &str, arguments: Value) -> ToolOutput {
        match ToolCall::from_parts(tool, arguments) {
            Ok(call) => self.call(call).await,
            Err(err) => ToolOutput::from_result(Err(err), self.config.tools.max_output_bytes),
        }
    }

    /// Close the shell session if one was started.
    pub async fn shutdown(&self) {
        if let Some(session) = self.shell.lock().await.take() {
            session.close().await;
        }
    }
}
