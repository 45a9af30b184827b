//! NDJSON request loop driven over in-memory pipes.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use agent_toolbox::config::GlobalConfig;
use agent_toolbox::rpc::{serve, ToolResponse};
use agent_toolbox::Toolbox;

async fn run_requests(toolbox: &Toolbox, input: &str) -> Vec<ToolResponse> {
    let (mut client_out, server_in) = tokio::io::duplex(1 << 20);
    let (server_out, mut client_in) = tokio::io::duplex(1 << 20);

    client_out.write_all(input.as_bytes()).await.expect("write requests");
    drop(client_out);

    serve(toolbox, server_in, server_out, CancellationToken::new())
        .await
        .expect("serve");

    let mut raw = String::new();
    client_in.read_to_string(&mut raw).await.expect("read responses");
    raw.lines()
        .map(|line| serde_json::from_str(line).expect("response json"))
        .collect()
}

fn toolbox() -> (tempfile::TempDir, Toolbox) {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig::for_workspace(temp.path()).expect("config");
    (temp, Toolbox::new(Arc::new(config)))
}

#[tokio::test]
async fn answers_each_request_in_order() {
    let (temp, toolbox) = toolbox();
    let root = temp.path().canonicalize().expect("canonicalize");
    let path = root.join("a.txt");
    let path_str = path.to_str().expect("utf8");

    let requests = [
        json!({ "id": 1, "tool": "text_editor", "arguments": { "command": "create", "path": path_str, "file_text": "hello\n" } }),
        json!({ "id": "two", "tool": "text_editor", "arguments": { "command": "view", "path": path_str } }),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n");

    let responses = run_requests(&toolbox, &format!("{requests}\n")).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].id, json!(1));
    assert!(!responses[0].is_error);
    assert_eq!(
        responses[0].output,
        format!("File successfully created at {path_str}.")
    );
    assert_eq!(responses[1].id, json!("two"));
    assert!(responses[1].output.ends_with("```\n  1 hello\n```"));
    assert_eq!(fs::read_to_string(&path).expect("read"), "hello\n");
}

#[tokio::test]
async fn malformed_line_gets_null_id_error() {
    let (_temp, toolbox) = toolbox();

    let responses = run_requests(&toolbox, "{not json\n").await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, Value::Null);
    assert!(responses[0].is_error);
    assert!(responses[0].output.starts_with("Error: protocol: invalid json"));
}

#[tokio::test]
async fn request_without_tool_keeps_its_id() {
    let (_temp, toolbox) = toolbox();

    let responses = run_requests(&toolbox, "{\"id\": 7, \"arguments\": {}}\n").await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, json!(7));
    assert!(responses[0].is_error);
    assert!(responses[0].output.contains("invalid request"));
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let (_temp, toolbox) = toolbox();

    let responses = run_requests(
        &toolbox,
        "\n   \n{\"id\": 1, \"tool\": \"nope\", \"arguments\": {}}\n\n",
    )
    .await;

    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_error);
    assert!(responses[0].output.contains("unknown tool"));
}

#[tokio::test]
async fn cancelled_token_stops_loop() {
    let (_temp, toolbox) = toolbox();
    let (_client_out, server_in) = tokio::io::duplex(1024);
    let (server_out, _client_in) = tokio::io::duplex(1024);

    let cancel = CancellationToken::new();
    cancel.cancel();

    serve(&toolbox, server_in, server_out, cancel)
        .await
        .expect("serve stops cleanly");
}
