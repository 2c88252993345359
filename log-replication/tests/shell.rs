use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};

fn run_shell(args: &[&str], script: &str) -> Result<String> {
    let binary = assert_cmd::cargo::cargo_bin!("log-replication");
    let mut child = Command::new(binary)
        .args(args)
        .env("RUST_LOG", "warn")
        .env("RUST_LOG_STYLE", "never")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to spawn log-replication")?;

    child
        .stdin
        .take()
        .context("stdin missing after spawn")?
        .write_all(script.as_bytes())
        .context("failed to send script")?;

    let output = child
        .wait_with_output()
        .context("failed to wait for log-replication")?;
    if !output.status.success() {
        return Err(anyhow!("log-replication exited with status {}", output.status));
    }
    Ok(String::from_utf8(output.stdout)?)
}

#[test]
fn shell_session_end_to_end() -> Result<()> {
    let stdout = run_shell(
        &["--no-chaos", "--followers", "2", "--seed", "3"],
        "write k1 v1\nwrite k2 hello world\ndelete k1\nlogs\nstatus\ndown follower-1\nstatus\nexit\n",
    )?;

    assert!(stdout.starts_with("Replication system ready: 1 master, 2 followers."));
    assert!(stdout.contains("OK: k1 = v1 (log #1)"));
    assert!(stdout.contains("OK: k2 = hello world (log #2)"));
    assert!(stdout.contains("OK: deleted k1"));
    assert!(stdout.contains("#1 WRITE key='k1' value='v1'"));
    assert!(stdout.contains("#3 DELETE key='k1'"));
    assert!(stdout.contains("master: UP"));
    assert!(stdout.contains("failure simulator: stopped"));
    assert!(stdout.contains("follower-1: DOWN"));
    assert!(stdout.contains("Shutting down..."));
    Ok(())
}

#[test]
fn end_of_input_exits_cleanly() -> Result<()> {
    let stdout = run_shell(&["--no-chaos"], "help\nbogus\n")?;
    assert!(stdout.contains("WRITE <key> <value>"));
    assert!(stdout.contains("ERROR: unknown command"));
    Ok(())
}

#[test]
fn invalid_flags_fail_before_the_prompt() -> Result<()> {
    let status = Command::new(assert_cmd::cargo::cargo_bin!("log-replication"))
        .args(["--failure-probability", "1.5"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    assert!(!status.success());
    Ok(())
}
