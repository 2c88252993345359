//! Command parsing for the interactive shell.
//!
//! The shell reads one line at a time and turns it into a [`ConsoleCommand`].
//! Parsing is kept apart from execution so the grammar can be tested without
//! a running replication system.

use anyhow::{Context, Result, anyhow};

/// Commands accepted at the shell prompt.
#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Write { key: String, value: String },
    Read { key: String },
    Delete { key: String },
    Show,
    Logs { json: bool },
    Status,
    Down { node: String },
    Up { node: String },
    Chaos {
        failure_probability: f64,
        recovery_probability: f64,
        interval_secs: u64,
    },
    Calm,
    Help,
    Exit,
}

pub const USAGE: &str = "\
Commands (case-insensitive):
  WRITE <key> <value>      (alias: w)  -- write through the master
  READ <key>               (alias: r)  -- read from a random live follower
  DELETE <key>             (alias: d)  -- delete through the master
  SHOW                     (alias: s)  -- store snapshot from a random live follower
  LOGS [json]              (alias: l)  -- master's replication log
  STATUS                   (alias: t)  -- up/down state of every node
  DOWN <node>                          -- take a node down
  UP <node>                            -- bring a node back (followers recover)
  CHAOS <p_fail> <p_recover> <secs>    -- retune the failure simulator
  CALM                                 -- stop new failures, recover everyone
  HELP                     (alias: h)  -- show this message
  EXIT                     (alias: e)  -- shut down and quit";

impl ConsoleCommand {
    /// Parses a line of user input into a command.
    ///
    /// # Syntax
    /// The first word is case-insensitive and may be a one-letter alias.
    /// Everything after the key of a `WRITE` is the value, so values may
    /// contain spaces.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Err(anyhow!("empty command"));
        };

        let cmd = first.to_uppercase();
        let normalized_cmd = match cmd.as_str() {
            "W" => "WRITE",
            "R" => "READ",
            "D" => "DELETE",
            "S" => "SHOW",
            "L" => "LOGS",
            "T" => "STATUS",
            "H" => "HELP",
            "E" => "EXIT",
            other => other,
        };

        match (normalized_cmd, parts.len()) {
            ("SHOW", 1) => Ok(ConsoleCommand::Show),
            ("STATUS", 1) => Ok(ConsoleCommand::Status),
            ("CALM", 1) => Ok(ConsoleCommand::Calm),
            ("HELP", 1) => Ok(ConsoleCommand::Help),
            ("EXIT", 1) => Ok(ConsoleCommand::Exit),
            ("LOGS", 1) => Ok(ConsoleCommand::Logs { json: false }),
            ("LOGS", 2) if parts[1].eq_ignore_ascii_case("json") => {
                Ok(ConsoleCommand::Logs { json: true })
            }
            ("READ", 2) => Ok(ConsoleCommand::Read {
                key: parts[1].to_string(),
            }),
            ("DELETE", 2) => Ok(ConsoleCommand::Delete {
                key: parts[1].to_string(),
            }),
            ("DOWN", 2) => Ok(ConsoleCommand::Down {
                node: parts[1].to_string(),
            }),
            ("UP", 2) => Ok(ConsoleCommand::Up {
                node: parts[1].to_string(),
            }),
            ("WRITE", n) if n >= 3 => Ok(ConsoleCommand::Write {
                key: parts[1].to_string(),
                value: parts[2..].join(" "),
            }),
            ("CHAOS", 4) => Ok(ConsoleCommand::Chaos {
                failure_probability: parts[1]
                    .parse()
                    .with_context(|| format!("invalid failure probability '{}'", parts[1]))?,
                recovery_probability: parts[2]
                    .parse()
                    .with_context(|| format!("invalid recovery probability '{}'", parts[2]))?,
                interval_secs: parts[3]
                    .parse()
                    .with_context(|| format!("invalid interval '{}'", parts[3]))?,
            }),
            ("WRITE", _) => Err(anyhow!("WRITE requires a key and a value: WRITE <key> <value>")),
            ("READ" | "DELETE" | "DOWN" | "UP", _) => Err(anyhow!(
                "{normalized_cmd} requires exactly one argument"
            )),
            ("CHAOS", _) => Err(anyhow!("usage: CHAOS <p_fail> <p_recover> <secs>")),
            ("LOGS", _) => Err(anyhow!("usage: LOGS [json]")),
            ("SHOW" | "STATUS" | "CALM" | "HELP" | "EXIT", _) => {
                Err(anyhow!("{normalized_cmd} takes no arguments"))
            }
            _ => Err(anyhow!(
                "unknown command. Try: write, read, delete, show, logs, status, help, exit"
            )),
        }
    }
}
