//! The replicated state shared by every node.
//!
//! Each node owns one [`ReplicatedStore`]: the key-value data, the ordered log
//! that produced it, and the index of the last applied entry. All three live
//! behind a single read-write lock so they always change together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entry::{LogEntry, Operation};
use crate::error::{ReplicationError, Result};

#[derive(Default)]
struct StoreState {
    data: HashMap<String, String>,
    log: Vec<LogEntry>,
    applied_index: u64,
}

impl StoreState {
    fn apply(&mut self, entry: LogEntry) {
        match entry.operation() {
            Operation::Write => {
                let value = entry.value().unwrap_or_default().to_string();
                self.data.insert(entry.key().to_string(), value);
            }
            Operation::Delete => {
                self.data.remove(entry.key());
            }
        }
        self.applied_index = entry.sequence_id();
        self.log.push(entry);
    }
}

/// Data map, ordered log and applied index of one node, plus its up/down flag.
///
/// Queries take the shared side of the lock; applying entries takes the
/// exclusive side. The availability flag is atomic and checked before the
/// lock is taken, so a down node answers nothing at all instead of "empty".
pub struct ReplicatedStore {
    node_id: String,
    available: AtomicBool,
    state: RwLock<StoreState>,
}

impl ReplicatedStore {
    /// Creates an empty, available store for the given node.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            available: AtomicBool::new(true),
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Sets the availability flag and returns the previous value.
    pub fn set_available(&self, available: bool) -> bool {
        self.available.swap(available, Ordering::AcqRel)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ReplicationError::node_down(&self.node_id))
        }
    }

    // The guarded state is only changed by complete apply steps, so a
    // poisoned lock still holds consistent data.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current value for `key`, `Ok(None)` if it is absent.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_available()?;
        Ok(self.read_state().data.get(key).cloned())
    }

    /// Removes `key` from the data map without logging it.
    ///
    /// Returns `Ok(false)` when the key is absent.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.ensure_available()?;
        Ok(self.write_state().data.remove(key).is_some())
    }

    /// Returns an independent copy of the data map.
    pub fn snapshot(&self) -> Result<HashMap<String, String>> {
        self.ensure_available()?;
        Ok(self.read_state().data.clone())
    }

    /// Sequence id of the last applied entry, `None` while the node is down.
    pub fn applied_index(&self) -> Option<u64> {
        if !self.is_available() {
            return None;
        }
        Some(self.read_state().applied_index)
    }

    /// Applies `entry` only if it directly follows the last applied one.
    ///
    /// Anything else is rejected untouched: entries are never buffered,
    /// recovery re-delivers them in order.
    pub fn apply_in_order(&self, entry: &LogEntry) -> Result<()> {
        self.ensure_available()?;
        let mut state = self.write_state();
        let expected = state.applied_index + 1;
        if entry.sequence_id() != expected {
            return Err(ReplicationError::OutOfOrder {
                node: self.node_id.clone(),
                expected,
                received: entry.sequence_id(),
            });
        }
        state.apply(entry.clone());
        Ok(())
    }

    /// Builds and applies a new entry inside one exclusive critical section.
    pub fn commit<F>(&self, build: F) -> Result<LogEntry>
    where
        F: FnOnce() -> LogEntry,
    {
        self.ensure_available()?;
        let mut state = self.write_state();
        let entry = build();
        debug_assert_eq!(entry.sequence_id(), state.applied_index + 1);
        state.apply(entry.clone());
        Ok(entry)
    }

    /// Like [`commit`](Self::commit), but `build` sees the current data map
    /// and may return `None` to decline without any side effect. The master
    /// uses both to assign sequence ids atomically with the local apply.
    pub fn commit_with<F>(&self, build: F) -> Result<Option<LogEntry>>
    where
        F: FnOnce(&HashMap<String, String>) -> Option<LogEntry>,
    {
        self.ensure_available()?;
        let mut state = self.write_state();
        let Some(entry) = build(&state.data) else {
            return Ok(None);
        };
        debug_assert_eq!(entry.sequence_id(), state.applied_index + 1);
        state.apply(entry.clone());
        Ok(Some(entry))
    }

    /// All log entries with a sequence id greater than `index`, in order.
    pub fn entries_after(&self, index: u64) -> Result<Vec<LogEntry>> {
        self.ensure_available()?;
        let state = self.read_state();
        let start = state.log.partition_point(|entry| entry.sequence_id() <= index);
        Ok(state.log[start..].to_vec())
    }
}
