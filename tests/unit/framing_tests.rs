//! Sentinel framing state machine and output cleanup.

use agent_toolbox::terminal::framing::{
    changes_directory, clean_output, marker_command, shell_quote, strip_control_sequences,
    FrameState, Framer, Resync, IDLE_BUFFER_LIMIT,
};

const SENTINEL: &str = "__test_sentinel__";

#[test]
fn idle_framer_yields_nothing() {
    let mut framer = Framer::new(SENTINEL);
    framer.push(b"hello\n__test_sentinel__");

    assert_eq!(framer.state(), FrameState::Idle);
    assert_eq!(framer.poll(), None);
}

#[test]
fn frame_ends_at_sentinel() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.push(b"hi\n");
    assert_eq!(framer.poll(), None);
    assert_eq!(framer.state(), FrameState::AwaitingPrompt);

    framer.push(b"__test_sentinel__");
    assert_eq!(framer.poll(), Some(b"hi\n".to_vec()));
    assert_eq!(framer.state(), FrameState::Idle);
    assert!(framer.pending().is_empty());
}

#[test]
fn sentinel_split_across_chunks_is_found() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.push(b"out\n__test_sen");
    assert_eq!(framer.poll(), None);

    framer.push(b"tinel__");
    assert_eq!(framer.poll(), Some(b"out\n".to_vec()));
}

#[test]
fn bytes_after_sentinel_stay_buffered() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.push(b"one\n__test_sentinel__two\n");

    assert_eq!(framer.poll(), Some(b"one\n".to_vec()));
    assert_eq!(framer.pending(), b"two\n");

    framer.begin();
    framer.push(b"__test_sentinel__");
    assert_eq!(framer.poll(), Some(b"two\n".to_vec()));
}

#[test]
fn abandon_marks_stream_desynced() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.push(b"partial output");
    framer.abandon();

    assert_eq!(framer.state(), FrameState::Idle);
    assert!(framer.is_desynced());
}

#[test]
fn abandon_when_idle_is_a_no_op() {
    let mut framer = Framer::new(SENTINEL);
    framer.abandon();
    assert!(!framer.is_desynced());
}

#[test]
fn resync_after_slow_command_skips_its_prompt() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.abandon();

    framer.begin_resync("nonce-one");
    assert_eq!(framer.state(), FrameState::Resyncing);
    // The slow command finishes, then the marker runs.
    framer.push(b" done\n__test_sentinel__");
    assert_eq!(framer.poll_resync(), Some(Resync::StalePrompt));

    framer.begin_resync("nonce-two");
    framer.push(b"nonce-one\n__test_sentinel__nonce-two\n__test_sentinel__");
    assert_eq!(framer.poll_resync(), Some(Resync::Synced));
    assert!(!framer.is_desynced());
    assert_eq!(framer.state(), FrameState::Idle);

    framer.begin();
    framer.push(b"ok\n__test_sentinel__");
    assert_eq!(framer.poll(), Some(b"ok\n".to_vec()));
}

#[test]
fn resync_recovers_when_marker_is_read_as_input() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.abandon();

    // A command waiting on stdin takes the first marker line as its input.
    framer.begin_resync("nonce-one");
    framer.push(b"__test_sentinel__");
    assert_eq!(framer.poll_resync(), Some(Resync::StalePrompt));
    assert!(framer.is_desynced());

    framer.begin_resync("nonce-two");
    framer.push(b"nonce-two\n__test_sentinel__");
    assert_eq!(framer.poll_resync(), Some(Resync::Synced));

    framer.begin();
    framer.push(b"ok\n__test_sentinel__");
    assert_eq!(framer.poll(), Some(b"ok\n".to_vec()));
}

#[test]
fn timed_out_resync_stays_desynced() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.abandon();
    framer.begin_resync("nonce-one");
    framer.abandon();

    assert!(framer.is_desynced());
    assert_eq!(framer.state(), FrameState::Idle);

    framer.begin_resync("nonce-two");
    framer.push(b"nonce-one\n__test_sentinel__nonce-two\n__test_sentinel__");
    assert_eq!(framer.poll_resync(), Some(Resync::Synced));
}

#[test]
fn marker_command_does_not_contain_its_nonce() {
    let command = marker_command("0123456789abcdef");
    assert!(!command.contains("0123456789abcdef"));
    assert_eq!(command, r"printf '%s%s\n' 01234567 89abcdef");
}

#[test]
fn idle_output_is_capped() {
    let mut framer = Framer::new(SENTINEL);
    framer.push(&vec![b'x'; IDLE_BUFFER_LIMIT]);
    framer.push(b"tail");

    assert_eq!(framer.pending().len(), IDLE_BUFFER_LIMIT);
    assert!(framer.pending().ends_with(b"tail"));
}

#[test]
fn output_of_running_command_is_not_capped() {
    let mut framer = Framer::new(SENTINEL);
    framer.begin();
    framer.push(&vec![b'x'; IDLE_BUFFER_LIMIT * 2]);

    assert_eq!(framer.pending().len(), IDLE_BUFFER_LIMIT * 2);
}

#[test]
fn strips_ansi_sequences() {
    let raw = "\x1b[1;32mgreen\x1b[0m \x1b]0;title\x07text\r";
    assert_eq!(strip_control_sequences(raw), "green text");
}

#[test]
fn clean_output_drops_echo_and_trims() {
    let raw = b"echo hi\r\n  hi  \r\n\r\n";
    assert_eq!(clean_output(raw, "echo hi"), "hi");
}

#[test]
fn clean_output_keeps_output_that_is_not_an_echo() {
    let raw = b"first\nsecond\n";
    assert_eq!(clean_output(raw, "printf 'first\\nsecond\\n'"), "first\nsecond");
}

#[test]
fn clean_output_of_silent_command_is_empty() {
    assert_eq!(clean_output(b"\r\n", "true"), "");
}

#[test]
fn detects_directory_changes() {
    assert!(changes_directory("cd /tmp"));
    assert!(changes_directory("mkdir x && cd x"));
    assert!(changes_directory("pushd /srv; ls"));
    assert!(changes_directory("(popd)"));
    assert!(!changes_directory("echo cd"));
    assert!(!changes_directory("ls -la"));
    assert!(!changes_directory("cdrecord --help"));
}

#[test]
fn quotes_single_quotes() {
    assert_eq!(shell_quote("/work dir"), "'/work dir'");
    assert_eq!(shell_quote("it's"), r"'it'\''s'");
}
