#![forbid(unsafe_code)]

//! Tools for autonomous coding agents: a persistent shell session driven over
//! a pseudo-terminal and a line-indexed text editor, exposed as `bash` and
//! `text_editor` tool calls.

pub mod config;
pub mod editor;
pub mod errors;
pub mod rpc;
pub mod terminal;
pub mod tools;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use terminal::ShellSession;
pub use tools::Toolbox;
