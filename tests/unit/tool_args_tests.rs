//! Decoding of tool calls and editor arguments.

use std::time::Duration;

use serde_json::json;

use agent_toolbox::config::TerminalConfig;
use agent_toolbox::editor::LineRange;
use agent_toolbox::tools::{BashArgs, EditorCommand, TextEditorArgs, ToolCall};
use agent_toolbox::AppError;

fn editor_args(value: serde_json::Value) -> TextEditorArgs {
    serde_json::from_value(value).expect("valid text_editor arguments")
}

#[test]
fn decodes_bash_call_with_defaults() {
    let call = ToolCall::from_parts("bash", json!({ "command": "ls" })).expect("bash call");
    let ToolCall::Bash(args) = call else {
        panic!("expected bash call");
    };
    assert_eq!(args.command, "ls");
    assert!(!args.reset_cwd);
    assert_eq!(args.timeout_seconds, None);
}

#[test]
fn decodes_text_editor_call() {
    let call = ToolCall::from_parts(
        "text_editor",
        json!({ "command": "view", "path": "/f.txt", "view_range": [1, -1] }),
    )
    .expect("editor call");
    assert_eq!(call.name(), "text_editor");
}

#[test]
fn unknown_tool_is_rejected() {
    let err = ToolCall::from_parts("grep", json!({})).expect_err("unknown tool");
    assert!(matches!(err, AppError::InvalidArguments(msg) if msg.contains("grep")));
}

#[test]
fn missing_bash_command_is_rejected() {
    let err = ToolCall::from_parts("bash", json!({ "reset_cwd": true })).expect_err("no command");
    assert!(matches!(err, AppError::InvalidArguments(msg) if msg.contains("command")));
}

#[test]
fn bash_timeout_defaults_to_config() {
    let config = TerminalConfig::default();
    let args = BashArgs {
        command: "true".into(),
        ..BashArgs::default()
    };
    assert_eq!(args.timeout(&config).expect("timeout"), config.command_timeout());

    let args = BashArgs {
        timeout_seconds: Some(3),
        ..args
    };
    assert_eq!(args.timeout(&config).expect("timeout"), Duration::from_secs(3));
}

#[test]
fn zero_bash_timeout_is_rejected() {
    let args = BashArgs {
        command: "true".into(),
        timeout_seconds: Some(0),
        ..BashArgs::default()
    };
    assert!(matches!(
        args.timeout(&TerminalConfig::default()),
        Err(AppError::InvalidArguments(_))
    ));
}

#[test]
fn view_with_range() {
    let args = editor_args(json!({ "command": "view", "path": "/f", "view_range": [2, 5] }));
    assert_eq!(
        EditorCommand::from_args(&args).expect("view"),
        EditorCommand::View {
            range: Some(LineRange::new(2, 5))
        }
    );
}

#[test]
fn view_range_must_have_two_values() {
    let args = editor_args(json!({ "command": "view", "path": "/f", "view_range": [2] }));
    assert!(matches!(
        EditorCommand::from_args(&args),
        Err(AppError::InvalidRange(_))
    ));
}

#[test]
fn create_without_text_writes_empty_file() {
    let args = editor_args(json!({ "command": "create", "path": "/f" }));
    assert_eq!(
        EditorCommand::from_args(&args).expect("create"),
        EditorCommand::Create {
            file_text: String::new()
        }
    );
}

#[test]
fn str_replace_requires_old_str() {
    let args = editor_args(json!({ "command": "str_replace", "path": "/f", "new_str": "x" }));
    let err = EditorCommand::from_args(&args).expect_err("missing old_str");
    assert!(matches!(err, AppError::InvalidArguments(msg) if msg.contains("old_str")));
}

#[test]
fn str_replace_without_new_str_deletes() {
    let args = editor_args(json!({ "command": "str_replace", "path": "/f", "old_str": "TODO" }));
    assert_eq!(
        EditorCommand::from_args(&args).expect("replace"),
        EditorCommand::Replace {
            old: "TODO".into(),
            new: None
        }
    );
}

#[test]
fn insert_requires_line_and_text() {
    let args = editor_args(json!({ "command": "insert", "path": "/f", "new_str": "x" }));
    let err = EditorCommand::from_args(&args).expect_err("missing insert_line");
    assert!(matches!(err, AppError::InvalidArguments(msg) if msg.contains("insert_line")));

    let args = editor_args(json!({ "command": "insert", "path": "/f", "insert_line": 0 }));
    let err = EditorCommand::from_args(&args).expect_err("missing new_str");
    assert!(matches!(err, AppError::InvalidArguments(msg) if msg.contains("new_str")));
}

#[test]
fn unknown_editor_command_is_rejected() {
    let args = editor_args(json!({ "command": "undo_edit", "path": "/f" }));
    let err = EditorCommand::from_args(&args).expect_err("unknown command");
    assert!(matches!(err, AppError::InvalidArguments(msg) if msg.contains("undo_edit")));
}
