//! Shell process lifecycle on a pseudo-terminal.

use std::path::Path;

use agent_toolbox::config::TerminalConfig;
use agent_toolbox::terminal::PtyProcess;

#[test]
fn kill_reaps_the_shell() {
    if !Path::new("/bin/bash").exists() || !Path::new("/proc/self").exists() {
        return;
    }
    let temp = tempfile::tempdir().expect("tempdir");
    let config = TerminalConfig::default();
    let mut process =
        PtyProcess::spawn(&config, temp.path(), "__pty_process_test__").expect("spawn shell");
    let pid = process.pid().expect("pid");
    assert!(Path::new(&format!("/proc/{pid}")).exists());

    process.kill();

    assert!(process.has_exited());
    assert!(!Path::new(&format!("/proc/{pid}")).exists(), "shell {pid} left as a zombie");
}

#[test]
fn kill_after_exit_is_a_no_op() {
    if !Path::new("/bin/bash").exists() {
        return;
    }
    let temp = tempfile::tempdir().expect("tempdir");
    let config = TerminalConfig::default();
    let mut process =
        PtyProcess::spawn(&config, temp.path(), "__pty_process_test__").expect("spawn shell");

    process.kill();
    process.kill();
    assert!(process.has_exited());
}
