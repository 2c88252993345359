//! The master node: origin of ordering for every write and delete.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tracing::{debug, info, warn};

use crate::entry::LogEntry;
use crate::error::Result;
use crate::follower::Follower;
use crate::node::Node;
use crate::pool::ReplicationPool;
use crate::store::ReplicatedStore;

/// Accepts writes, assigns sequence ids and fans entries out to followers.
///
/// A write is applied to the master's own store under its exclusive lock;
/// replication happens afterwards on the [`ReplicationPool`] and is never
/// awaited by the caller.
pub struct Master {
    store: ReplicatedStore,
    followers: RwLock<Vec<Arc<Follower>>>,
    next_sequence_id: AtomicU64,
    /// Which followers applied each entry. Observability only; like the log
    /// it keeps every entry for the life of the process and is never pruned.
    acks: Mutex<HashMap<u64, BTreeSet<String>>>,
    pool: ReplicationPool,
    this: Weak<Master>,
}

impl Master {
    pub fn new(id: impl Into<String>, replication_workers: usize) -> Result<Arc<Self>> {
        let pool = ReplicationPool::new(replication_workers)?;
        let store = ReplicatedStore::new(id);
        Ok(Arc::new_cyclic(|this| Self {
            store,
            followers: RwLock::new(Vec::new()),
            next_sequence_id: AtomicU64::new(1),
            acks: Mutex::new(HashMap::new()),
            pool,
            this: this.clone(),
        }))
    }

    /// Adds `follower` to the fan-out set. Registering twice is a no-op.
    pub fn register_follower(&self, follower: Arc<Follower>) {
        let mut followers = self.followers.write().unwrap_or_else(PoisonError::into_inner);
        if followers.iter().any(|known| known.id() == follower.id()) {
            return;
        }
        info!(master = %self.id(), follower = %follower.id(), "registered follower");
        followers.push(follower);
    }

    pub fn followers(&self) -> Vec<Arc<Follower>> {
        self.followers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Writes `key = value` locally and schedules replication.
    ///
    /// Returns the sequence id assigned to the write.
    pub fn write(&self, key: &str, value: &str) -> Result<u64> {
        let entry = self
            .store
            .commit(|| LogEntry::write(self.allocate_sequence_id(), key, value))?;
        debug!(sequence_id = entry.sequence_id(), key, value, "master applied write");
        let sequence_id = entry.sequence_id();
        self.replicate(entry);
        Ok(sequence_id)
    }

    // Only called while the store's exclusive lock is held, which keeps
    // the ids gapless and in apply order.
    fn allocate_sequence_id(&self) -> u64 {
        self.next_sequence_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Fans `entry` out to every registered follower, one task each.
    fn replicate(&self, entry: LogEntry) {
        let entry = Arc::new(entry);
        for follower in self.followers() {
            let entry = Arc::clone(&entry);
            let master = self.this.clone();
            let spawned = self.pool.spawn(async move {
                deliver(&follower, &entry, &master);
            });
            if !spawned {
                break;
            }
        }
    }

    /// Schedules a recovery pull for `follower` on the replication pool.
    pub fn schedule_recovery(&self, follower: Arc<Follower>) {
        if !self.is_available() {
            warn!(master = %self.id(), follower = %follower.id(), "master is down, cannot recover follower");
            return;
        }
        let master = self.this.clone();
        self.pool.spawn(async move {
            if let Some(master) = master.upgrade() {
                follower.recover_from(&master);
            }
        });
    }

    pub(crate) fn record_ack(&self, sequence_id: u64, follower: &str) {
        self.acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(sequence_id)
            .or_default()
            .insert(follower.to_string());
    }

    /// Follower ids known to have applied `sequence_id`.
    pub fn replication_acks(&self, sequence_id: u64) -> BTreeSet<String> {
        self.acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&sequence_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Releases the replication pool. Idempotent.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl Node for Master {
    fn store(&self) -> &ReplicatedStore {
        &self.store
    }

    /// Deletes `key` and replicates the deletion.
    ///
    /// An absent key is declined with `Ok(false)` and no log entry.
    fn delete(&self, key: &str) -> Result<bool> {
        let committed = self.store.commit_with(|data| {
            data.contains_key(key)
                .then(|| LogEntry::delete(self.allocate_sequence_id(), key))
        })?;
        let Some(entry) = committed else {
            debug!(key, "master declined delete of missing key");
            return Ok(false);
        };
        debug!(sequence_id = entry.sequence_id(), key, "master applied delete");
        self.replicate(entry);
        Ok(true)
    }
}

/// One fan-out delivery. A down follower simply misses the entry and
/// catches up when it comes back; a gap triggers a recovery pull.
fn deliver(follower: &Arc<Follower>, entry: &LogEntry, master: &Weak<Master>) {
    if !follower.is_available() {
        debug!(
            follower = %follower.id(),
            sequence_id = entry.sequence_id(),
            "follower is down, entry not delivered"
        );
        return;
    }
    match follower.apply_entry(entry) {
        Ok(()) => {
            if let Some(master) = master.upgrade() {
                master.record_ack(entry.sequence_id(), follower.id());
            }
        }
        Err(err) if err.is_gap() => {
            debug!(follower = %follower.id(), error = %err, "gap detected during fan-out");
            follower.request_recovery();
        }
        Err(err) => {
            debug!(follower = %follower.id(), error = %err, "fan-out entry rejected");
        }
    }
}
