//! Sentinel-prompt framing over the shell's output stream.
//!
//! The shell's prompt is set to a unique sentinel, so every time the sentinel
//! shows up the previous command has finished. [`Framer`] is the state
//! machine that cuts the byte stream into one frame per command:
//!
//! ```text
//! Idle --begin--> AwaitingPrompt --sentinel seen--> Idle
//!                       |
//!                       +--abandon (timeout)--> Idle, desynchronized
//!
//! Idle (desynchronized) --begin_resync--> Resyncing --marker frame--> Idle
//!                                             |
//!                                             +--unmarked frame--> StalePrompt, resend marker
//! ```
//!
//! After a timeout nothing is assumed about how many prompts the shell still
//! owes: the abandoned command may finish later, or it may swallow the next
//! line typed as its own input. Instead the session types a marker command
//! that prints a fresh nonce and waits for the frame carrying it. Frames with
//! no nonce are stale and make the session type another marker, since the
//! previous one may have been read as input. Marker frames that arrive late
//! are recognized and dropped wherever they show up.
//!
//! The protocol has no request IDs. If a command prints the sentinel itself,
//! or reassigns `PS1`, framing is corrupted until the session is reset.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Most bytes kept while no command is outstanding; older bytes are dropped.
pub const IDLE_BUFFER_LIMIT: usize = 64 * 1024;

/// Matches terminal escape sequences (CSI, OSC, DCS/PM/APC, two-byte escapes)
/// and stray control bytes other than newline and tab.
#[allow(clippy::expect_used)]
static CONTROL_SEQUENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[PX^_][^\x1b]*\x1b\\|\x1b[@-Z\\-_]|[\x00-\x08\x0b-\x1f\x7f]",
    )
    .expect("control sequence pattern is a valid literal")
});

/// Where the framing protocol currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No command outstanding.
    Idle,
    /// A command was written and its prompt has not been seen yet.
    AwaitingPrompt,
    /// A resync marker was written and its nonce has not been seen yet.
    Resyncing,
}

/// Outcome of one step of resynchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// The latest marker came back; the stream is aligned again.
    Synced,
    /// A prompt without the latest nonce arrived; type another marker.
    StalePrompt,
}

/// A sentinel-terminated chunk of output.
enum Chunk {
    Marker { latest: bool },
    Plain(Vec<u8>),
}

/// Splits shell output into per-command frames at each sentinel.
#[derive(Debug)]
pub struct Framer {
    sentinel: Vec<u8>,
    state: FrameState,
    buffer: Vec<u8>,
    desynced: bool,
    markers: Vec<String>,
}

impl Framer {
    /// Create an idle framer for `sentinel`.
    #[must_use]
    pub fn new(sentinel: &str) -> Self {
        Self {
            sentinel: sentinel.as_bytes().to_vec(),
            state: FrameState::Idle,
            buffer: Vec::new(),
            desynced: false,
            markers: Vec::new(),
        }
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Whether a command timed out and the stream has not been realigned since.
    #[must_use]
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Bytes received but not yet assigned to a frame.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Mark a command as written; the next unmarked sentinel ends it.
    pub fn begin(&mut self) {
        self.state = FrameState::AwaitingPrompt;
    }

    /// Mark a resync marker printing `nonce` as written.
    pub fn begin_resync(&mut self, nonce: &str) {
        self.markers.push(nonce.to_owned());
        self.state = FrameState::Resyncing;
    }

    /// Append raw output from the shell.
    ///
    /// While idle only the last [`IDLE_BUFFER_LIMIT`] bytes are kept.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        if self.state == FrameState::Idle && self.buffer.len() > IDLE_BUFFER_LIMIT {
            let excess = self.buffer.len() - IDLE_BUFFER_LIMIT;
            self.buffer.drain(..excess);
            debug!(dropped_bytes = excess, "dropped idle shell output");
        }
    }

    /// Return the finished frame if the awaited sentinel has arrived.
    ///
    /// The returned bytes exclude the sentinel. Bytes after it stay buffered
    /// for the next frame.
    pub fn poll(&mut self) -> Option<Vec<u8>> {
        if self.state != FrameState::AwaitingPrompt {
            return None;
        }

        loop {
            if let Chunk::Plain(frame) = self.next_chunk()? {
                self.state = FrameState::Idle;
                return Some(frame);
            }
        }
    }

    /// Advance resynchronization once a sentinel has arrived.
    pub fn poll_resync(&mut self) -> Option<Resync> {
        if self.state != FrameState::Resyncing {
            return None;
        }

        loop {
            match self.next_chunk()? {
                Chunk::Marker { latest: true } => {
                    self.state = FrameState::Idle;
                    self.desynced = false;
                    return Some(Resync::Synced);
                }
                Chunk::Marker { latest: false } => {}
                Chunk::Plain(frame) => {
                    debug!(
                        discarded_bytes = frame.len(),
                        "dropped output of a timed-out command"
                    );
                    return Some(Resync::StalePrompt);
                }
            }
        }
    }

    /// Give up on the outstanding command or marker after a timeout.
    pub fn abandon(&mut self) {
        if self.state != FrameState::Idle {
            self.desynced = true;
            self.state = FrameState::Idle;
        }
    }

    fn next_chunk(&mut self) -> Option<Chunk> {
        let position = find(&self.buffer, &self.sentinel)?;
        let frame: Vec<u8> = self
            .buffer
            .drain(..position + self.sentinel.len())
            .take(position)
            .collect();

        // Markers print in the order they were typed, so anything older than
        // the one just seen has either printed already or was read as input.
        let seen = self
            .markers
            .iter()
            .rposition(|nonce| find(&frame, nonce.as_bytes()).is_some());
        match seen {
            Some(index) => {
                let latest = index + 1 == self.markers.len();
                self.markers.drain(..=index);
                Some(Chunk::Marker { latest })
            }
            None => Some(Chunk::Plain(frame)),
        }
    }
}

/// Command that prints `nonce` without the nonce appearing in the typed line.
#[must_use]
pub fn marker_command(nonce: &str) -> String {
    let split = nonce.len() / 2;
    let (head, tail) = nonce.split_at(split);
    format!("printf '%s%s\\n' {head} {tail}")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Remove terminal escape sequences and control bytes.
#[must_use]
pub fn strip_control_sequences(text: &str) -> String {
    CONTROL_SEQUENCES.replace_all(text, "").into_owned()
}

/// Turn a raw frame into the text returned for `command`.
///
/// Strips control sequences, drops leading lines that echo the command back
/// (shells with local echo re-emit what was typed), trims every line and the
/// result as a whole.
#[must_use]
pub fn clean_output(raw: &[u8], command: &str) -> String {
    let text = strip_control_sequences(&String::from_utf8_lossy(raw));
    let mut lines: Vec<&str> = text.split('\n').collect();

    let echoed: Vec<&str> = command.lines().map(str::trim).collect();
    let echo_len = echoed.len();
    if echo_len > 0
        && !command.trim().is_empty()
        && lines.len() >= echo_len
        && lines
            .iter()
            .zip(&echoed)
            .all(|(line, typed)| line.trim() == *typed)
    {
        lines.drain(..echo_len);
    }

    lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

/// Whether `command` may change the shell's working directory.
#[must_use]
pub fn changes_directory(command: &str) -> bool {
    command
        .split(|c| matches!(c, ';' | '&' | '|' | '\n' | '(' | ')' | '{' | '}'))
        .filter_map(|segment| segment.split_whitespace().next())
        .any(|word| matches!(word, "cd" | "pushd" | "popd"))
}

/// Quote `value` as a single POSIX shell word.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
