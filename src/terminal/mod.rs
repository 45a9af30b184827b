//! Persistent interactive shell sessions driven over a pseudo-terminal.

pub mod framing;
pub mod pty;
pub mod session;

pub use framing::{FrameState, Framer, Resync};
pub use pty::PtyProcess;
pub use session::{generate_sentinel, ShellSession};
