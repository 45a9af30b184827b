//! Newline-delimited JSON front end over stdin and stdout.
//!
//! Each request line is `{"id": …, "tool": "bash" | "text_editor", "arguments": {…}}`
//! and is answered by exactly one `{"id": …, "output": "…", "is_error": bool}`
//! line. Requests are handled one at a time in arrival order.

pub mod codec;
pub mod server;

pub use codec::ToolCodec;
pub use server::{serve, ToolRequest, ToolResponse};
