//! The line-oriented shell around a [`ReplicationSystem`].
//!
//! Reads commands from any `BufRead`, writes human-readable results to any
//! `Write`. Engine diagnostics go through `tracing`, never through here.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use anyhow::Result;

use crate::protocol::{ConsoleCommand, USAGE};
use crate::system::ReplicationSystem;

const PROMPT: &str = "> ";

/// Runs commands until `EXIT` or end of input.
pub fn run<R, W>(system: &ReplicationSystem, input: R, mut output: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    prompt(&mut output)?;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            prompt(&mut output)?;
            continue;
        }
        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Exit) => {
                writeln!(output, "Shutting down...")?;
                return Ok(());
            }
            Ok(command) => execute(system, command, &mut output)?,
            Err(err) => writeln!(output, "ERROR: {err:#}")?,
        }
        prompt(&mut output)?;
    }
    writeln!(output)?;
    Ok(())
}

fn prompt<W: Write>(output: &mut W) -> Result<()> {
    write!(output, "{PROMPT}")?;
    output.flush()?;
    Ok(())
}

fn execute<W: Write>(system: &ReplicationSystem, command: ConsoleCommand, out: &mut W) -> Result<()> {
    match command {
        ConsoleCommand::Write { key, value } => match system.write(&key, &value) {
            Ok(sequence_id) => writeln!(out, "OK: {key} = {value} (log #{sequence_id})")?,
            Err(err) => writeln!(out, "ERROR: write failed: {err}")?,
        },
        ConsoleCommand::Read { key } => match system.read(&key) {
            Ok(Some(value)) => writeln!(out, "{key} = {value}")?,
            Ok(None) => writeln!(out, "{key} not found")?,
            Err(err) => writeln!(out, "ERROR: read failed: {err}")?,
        },
        ConsoleCommand::Delete { key } => match system.delete(&key) {
            Ok(true) => writeln!(out, "OK: deleted {key}")?,
            Ok(false) => writeln!(out, "{key} not found on master")?,
            Err(err) => writeln!(out, "ERROR: delete failed: {err}")?,
        },
        ConsoleCommand::Show => match system.store_snapshot() {
            Ok(store) if store.is_empty() => writeln!(out, "(empty)")?,
            Ok(store) => {
                for (key, value) in store.into_iter().collect::<BTreeMap<_, _>>() {
                    writeln!(out, "{key} = {value}")?;
                }
            }
            Err(err) => writeln!(out, "ERROR: {err}")?,
        },
        ConsoleCommand::Logs { json } => match system.logs() {
            Ok(entries) if entries.is_empty() => writeln!(out, "(no log entries)")?,
            Ok(entries) => {
                for entry in entries {
                    if json {
                        writeln!(out, "{}", serde_json::to_string(&entry)?)?;
                    } else {
                        writeln!(out, "{entry}")?;
                    }
                }
            }
            Err(err) => writeln!(out, "ERROR: {err}")?,
        },
        ConsoleCommand::Status => {
            for (node, up) in system.node_statuses() {
                writeln!(out, "{node}: {}", if up { "UP" } else { "DOWN" })?;
            }
            let simulator = if system.is_failure_simulator_running() {
                "running"
            } else {
                "stopped"
            };
            writeln!(out, "failure simulator: {simulator}")?;
        }
        ConsoleCommand::Down { node } => set_availability(system, &node, false, out)?,
        ConsoleCommand::Up { node } => set_availability(system, &node, true, out)?,
        ConsoleCommand::Chaos {
            failure_probability,
            recovery_probability,
            interval_secs,
        } => match system.start_failure_simulator(
            failure_probability,
            recovery_probability,
            interval_secs,
        ) {
            Ok(()) => writeln!(
                out,
                "OK: failure simulator p_fail={failure_probability} p_recover={recovery_probability} every {interval_secs}s"
            )?,
            Err(err) => writeln!(out, "ERROR: {err}")?,
        },
        ConsoleCommand::Calm => match system.start_failure_simulator(0.0, 1.0, 1) {
            Ok(()) => writeln!(out, "OK: no new failures, down followers recover on the next tick")?,
            Err(err) => writeln!(out, "ERROR: {err}")?,
        },
        ConsoleCommand::Help => writeln!(out, "{USAGE}")?,
        ConsoleCommand::Exit => {}
    }
    Ok(())
}

fn set_availability<W: Write>(
    system: &ReplicationSystem,
    node: &str,
    available: bool,
    out: &mut W,
) -> Result<()> {
    match system.set_node_available(node, available) {
        Ok(()) => writeln!(out, "OK: {node} is {}", if available { "UP" } else { "DOWN" })?,
        Err(err) => writeln!(out, "ERROR: {err}")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_script(system: &ReplicationSystem, script: &str) -> String {
        let mut output = Vec::new();
        run(system, script.as_bytes(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn writes_deletes_and_lists_the_log() {
        let system = ReplicationSystem::with_followers(2).unwrap();
        let output = run_script(
            &system,
            "write k1 v1\nwrite k2 two words\ndelete k1\ndelete k1\nlogs\nlogs json\nexit\n",
        );

        assert!(output.contains("OK: k1 = v1 (log #1)"));
        assert!(output.contains("OK: k2 = two words (log #2)"));
        assert!(output.contains("OK: deleted k1"));
        assert!(output.contains("k1 not found on master"));
        assert!(output.contains("#3 DELETE key='k1'"));
        assert!(output.contains("\"operation\":\"delete\""));
        assert!(output.contains("Shutting down..."));
    }

    #[test]
    fn status_and_node_control() {
        let system = ReplicationSystem::with_followers(2).unwrap();
        let output = run_script(&system, "down follower-0\nstatus\nup nobody\n");

        assert!(output.contains("OK: follower-0 is DOWN"));
        assert!(output.contains("follower-0: DOWN"));
        assert!(output.contains("follower-1: UP"));
        assert!(output.contains("master: UP"));
        assert!(output.contains("failure simulator: stopped"));
        assert!(output.contains("ERROR: unknown node 'nobody'"));
    }

    #[test]
    fn reports_parse_errors_and_keeps_going() {
        let system = ReplicationSystem::with_followers(1).unwrap();
        let output = run_script(&system, "bogus\nchaos 2 0 1\nchaos 0.1 0.3 99999999\nlogs\n");

        assert!(output.contains("ERROR: unknown command"));
        assert!(output.contains("ERROR: invalid configuration"));
        assert!(output.contains("simulator interval must be at most 86400s"));
        assert!(output.contains("(no log entries)"));
        assert!(!system.is_failure_simulator_running());
    }

    #[test]
    fn down_master_rejects_writes_but_followers_still_serve() {
        let system = ReplicationSystem::with_followers(1).unwrap();
        let output = run_script(&system, "down master\nwrite k v\nread k\n");

        assert!(output.contains("ERROR: write failed: node master is down"));
        assert!(output.contains("k not found"));
    }
}
