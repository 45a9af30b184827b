//! Request loop for the stdio front end.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::ToolCodec;
use crate::tools::{ToolOutput, Toolbox};
use crate::{AppError, Result};

/// One inbound request line.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolRequest {
    /// Caller-chosen identifier echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// Tool name: `bash` or `text_editor`.
    pub tool: String,
    /// Tool arguments object.
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One outbound response line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResponse {
    /// Identifier of the request this answers; `null` when it could not be read.
    pub id: Value,
    /// Tool result or error text.
    pub output: String,
    /// Whether `output` describes a failure.
    pub is_error: bool,
}

impl ToolResponse {
    fn from_output(id: Value, output: ToolOutput) -> Self {
        Self {
            id,
            output: output.text,
            is_error: output.is_error,
        }
    }

    fn error(id: Value, err: &AppError) -> Self {
        Self {
            id,
            output: format!("Error: {err}"),
            is_error: true,
        }
    }
}

/// Serve requests from `reader` until EOF or `cancel`, writing responses to `writer`.
///
/// Blank lines are skipped. A line that cannot be decoded gets an error
/// response carrying its `id` when one can be read, `null` otherwise. A line
/// longer than the codec limit is answered with an error and ends the stream.
///
/// # Errors
///
/// Returns `AppError::Io` if reading stdin fails or a response cannot be written.
pub async fn serve<R, W>(
    toolbox: &Toolbox,
    reader: R,
    writer: W,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut requests = FramedRead::new(reader, ToolCodec::new());
    let mut responses = FramedWrite::new(writer, ToolCodec::new());

    loop {
        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                info!("shutdown requested, stopping request loop");
                break;
            }

            item = requests.next() => item,
        };

        let response = match item {
            None => {
                info!("input closed, stopping request loop");
                break;
            }
            Some(Err(err @ AppError::Protocol(_))) => {
                warn!(%err, "rejected request line");
                ToolResponse::error(Value::Null, &err)
            }
            Some(Err(err)) => {
                warn!(%err, "failed to read request");
                return Err(err);
            }
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => handle_line(toolbox, &line).await,
        };

        let encoded = serde_json::to_string(&response)
            .map_err(|err| AppError::Io(format!("failed to encode response: {err}")))?;
        responses.send(encoded).await?;
    }

    Ok(())
}

async fn handle_line(toolbox: &Toolbox, line: &str) -> ToolResponse {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            let err = AppError::from(err);
            warn!(%err, "malformed request line");
            return ToolResponse::error(Value::Null, &err);
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: ToolRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(err) => {
            let err = AppError::Protocol(format!("invalid request: {err}"));
            warn!(%err, "malformed request");
            return ToolResponse::error(id, &err);
        }
    };

    debug!(id = %request.id, tool = %request.tool, "handling request");
    let output = toolbox.call_raw(&request.tool, request.arguments).await;
    ToolResponse::from_output(request.id, output)
}
