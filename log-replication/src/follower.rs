//! Follower nodes: ordered appliers of the master's log.

use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::master::Master;
use crate::node::Node;
use crate::store::ReplicatedStore;

/// A replica that applies the master's entries strictly in order and serves
/// reads from its own store.
///
/// Holds only weak references to its master and to itself; the master's
/// follower registry and the replication system own it.
pub struct Follower {
    store: ReplicatedStore,
    master: Weak<Master>,
    this: Weak<Follower>,
}

impl Follower {
    /// Creates a follower and registers it with `master`.
    pub fn new(id: impl Into<String>, master: &Arc<Master>) -> Arc<Self> {
        let follower = Arc::new_cyclic(|this| Self {
            store: ReplicatedStore::new(id),
            master: Arc::downgrade(master),
            this: this.clone(),
        });
        master.register_follower(Arc::clone(&follower));
        follower
    }

    /// Asks the master to schedule a catch-up pull. No-op while down.
    pub fn request_recovery(&self) {
        if !self.is_available() {
            debug!(follower = %self.id(), "follower is down, not requesting recovery");
            return;
        }
        let (Some(master), Some(this)) = (self.master.upgrade(), self.this.upgrade()) else {
            return;
        };
        debug!(follower = %self.id(), "requesting recovery from master");
        master.schedule_recovery(this);
    }

    /// Pulls every entry after the local applied index from `master` and
    /// applies them in order. Returns how many were applied.
    ///
    /// Live fan-out may deliver some of the same entries concurrently; those
    /// arrive here as stale duplicates and are skipped.
    pub fn recover_from(&self, master: &Master) -> usize {
        let Some(from) = self.applied_index() else {
            return 0;
        };
        let missing = match master.entries_after(from) {
            Ok(missing) => missing,
            Err(err) => {
                warn!(follower = %self.id(), error = %err, "recovery aborted");
                return 0;
            }
        };
        info!(follower = %self.id(), from, missing = missing.len(), "recovering from master");

        let mut applied = 0;
        for entry in &missing {
            match self.apply_entry(entry) {
                Ok(()) => {
                    master.record_ack(entry.sequence_id(), self.id());
                    applied += 1;
                }
                Err(err) if err.is_node_down() => {
                    warn!(follower = %self.id(), "follower went down during recovery");
                    break;
                }
                Err(err) => debug!(follower = %self.id(), error = %err, "skipped during recovery"),
            }
        }
        info!(
            follower = %self.id(),
            applied,
            applied_index = ?self.applied_index(),
            "recovery finished"
        );
        applied
    }
}

impl Node for Follower {
    fn store(&self) -> &ReplicatedStore {
        &self.store
    }

    /// Brings the follower back and immediately schedules a recovery pull.
    fn go_up(&self) {
        if !self.store.set_available(true) {
            info!(node = %self.id(), "node coming up");
        }
        self.request_recovery();
    }
}
