//! The capability contract shared by the master and its followers.
//!
//! Both node kinds are built around a [`ReplicatedStore`]; the trait supplies
//! every operation on top of it, and the concrete types only override what
//! differs (the master's logged delete, the follower's recovery on `go_up`).

use std::collections::HashMap;

use tracing::info;

use crate::entry::LogEntry;
use crate::error::Result;
use crate::store::ReplicatedStore;

pub trait Node: Send + Sync {
    /// The store backing this node.
    fn store(&self) -> &ReplicatedStore;

    fn id(&self) -> &str {
        self.store().node_id()
    }

    fn is_available(&self) -> bool {
        self.store().is_available()
    }

    fn go_down(&self) {
        if self.store().set_available(false) {
            info!(node = %self.id(), "node going down");
        }
    }

    fn go_up(&self) {
        if !self.store().set_available(true) {
            info!(node = %self.id(), "node coming up");
        }
    }

    /// Reads `key`; `Ok(None)` means the node is up but has no such key.
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.store().get(key)
    }

    /// Removes `key`; `Ok(false)` means it was absent and nothing changed.
    fn delete(&self, key: &str) -> Result<bool> {
        self.store().remove(key)
    }

    fn snapshot(&self) -> Result<HashMap<String, String>> {
        self.store().snapshot()
    }

    /// `None` while the node is down, otherwise the last applied sequence id.
    fn applied_index(&self) -> Option<u64> {
        self.store().applied_index()
    }

    fn apply_entry(&self, entry: &LogEntry) -> Result<()> {
        self.store().apply_in_order(entry)
    }

    fn entries_after(&self, index: u64) -> Result<Vec<LogEntry>> {
        self.store().entries_after(index)
    }
}
