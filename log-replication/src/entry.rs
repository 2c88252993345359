//! Log entries replicated from the master to its followers.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// The kind of state change carried by a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Write,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Write => f.write_str("WRITE"),
            Operation::Delete => f.write_str("DELETE"),
        }
    }
}

/// One immutable record in the replicated log.
///
/// Sequence ids are assigned by the master, start at 1 and never repeat.
/// Delete entries carry no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    sequence_id: u64,
    key: String,
    value: Option<String>,
    timestamp: SystemTime,
    operation: Operation,
}

impl LogEntry {
    pub fn write(sequence_id: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence_id,
            key: key.into(),
            value: Some(value.into()),
            timestamp: SystemTime::now(),
            operation: Operation::Write,
        }
    }

    pub fn delete(sequence_id: u64, key: impl Into<String>) -> Self {
        Self {
            sequence_id,
            key: key.into(),
            value: None,
            timestamp: SystemTime::now(),
            operation: Operation::Delete,
        }
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn is_delete(&self) -> bool {
        self.operation == Operation::Delete
    }

    /// Milliseconds since the Unix epoch, for display.
    pub fn timestamp_millis(&self) -> u128 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} key='{}'", self.sequence_id, self.operation, self.key)?;
        if let Some(value) = &self.value {
            write!(f, " value='{value}'")?;
        }
        write!(f, " (at {} ms)", self.timestamp_millis())
    }
}
