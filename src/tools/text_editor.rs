//! `text_editor` tool: `view`, `create`, `str_replace` and `insert` on absolute paths.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::path_safety;
use crate::editor::{self, LineRange};
use crate::{AppError, Result};

/// Raw arguments of a `text_editor` call.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TextEditorArgs {
    /// One of `view`, `create`, `str_replace`, `insert`.
    pub command: String,
    /// Absolute path of the target file.
    pub path: String,
    /// Content for `create`.
    #[serde(default)]
    pub file_text: Option<String>,
    /// `[start, end]` for `view`; `end = -1` reads to the end of the file.
    #[serde(default)]
    pub view_range: Option<Vec<i64>>,
    /// Exact text to replace for `str_replace`.
    #[serde(default)]
    pub old_str: Option<String>,
    /// Replacement for `str_replace`, or the text to add for `insert`.
    #[serde(default)]
    pub new_str: Option<String>,
    /// Line after which `insert` places the text; `0` is the top of the file.
    #[serde(default)]
    pub insert_line: Option<i64>,
}

/// A validated editor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    /// Show the file with line numbers.
    View {
        /// Optional line window.
        range: Option<LineRange>,
    },
    /// Write a file, replacing any existing content.
    Create {
        /// Full file content.
        file_text: String,
    },
    /// Replace every occurrence of `old` with `new`, or delete it when `new` is absent.
    Replace {
        /// Text to find.
        old: String,
        /// Replacement text.
        new: Option<String>,
    },
    /// Insert text after a line.
    Insert {
        /// Line number after which to insert.
        line: i64,
        /// Text to insert.
        text: String,
    },
}

impl EditorCommand {
    /// Build a command from raw arguments, checking that the ones it needs are present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArguments` for an unknown command or a missing
    /// argument, and `AppError::InvalidRange` for a `view_range` that is not
    /// exactly two integers.
    pub fn from_args(args: &TextEditorArgs) -> Result<Self> {
        match args.command.as_str() {
            "view" => {
                let range = args
                    .view_range
                    .as_deref()
                    .map(LineRange::from_values)
                    .transpose()?;
                Ok(Self::View { range })
            }
            "create" => Ok(Self::Create {
                file_text: args.file_text.clone().unwrap_or_default(),
            }),
            "str_replace" => Ok(Self::Replace {
                old: required(args.old_str.as_ref(), "old_str", "str_replace")?.clone(),
                new: args.new_str.clone(),
            }),
            "insert" => Ok(Self::Insert {
                line: *required(args.insert_line.as_ref(), "insert_line", "insert")?,
                text: required(args.new_str.as_ref(), "new_str", "insert")?.clone(),
            }),
            other => Err(AppError::InvalidArguments(format!(
                "unknown command `{other}`; expected one of view, create, str_replace, insert"
            ))),
        }
    }
}

fn required<'a, T>(value: Option<&'a T>, name: &str, command: &str) -> Result<&'a T> {
    value.ok_or_else(|| {
        AppError::InvalidArguments(format!("parameter `{name}` is required for command `{command}`"))
    })
}

/// Run one `text_editor` call and render its success text.
///
/// # Errors
///
/// Propagates path, argument and editor errors unchanged.
pub fn run(args: &TextEditorArgs, workspace_root: &Path) -> Result<String> {
    let path = path_safety::require_absolute(&args.path, workspace_root)?;
    let command = EditorCommand::from_args(args)?;
    info!(command = %args.command, path = %path.display(), "text_editor call");
    apply(&command, &path)
}

fn apply(command: &EditorCommand, path: &Path) -> Result<String> {
    let shown = path.display();
    match command {
        EditorCommand::View { range } => {
            let listing = editor::view(path, *range)?;
            Ok(format!(
                "Here's the result of running `cat -n` on {shown}:\n\n```\n{listing}\n```"
            ))
        }
        EditorCommand::Create { file_text } => {
            editor::create(path, file_text)?;
            Ok(format!("File successfully created at {shown}."))
        }
        EditorCommand::Replace { old, new } => {
            let occurrences = editor::replace(path, old, new.as_deref())?;
            Ok(format!("Successfully replaced {occurrences} occurrences in {shown}."))
        }
        EditorCommand::Insert { line, text } => {
            editor::insert(path, *line, text)?;
            Ok(format!("Successfully inserted text at line {line} in {shown}."))
        }
    }
}
