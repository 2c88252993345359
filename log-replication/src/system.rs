//! One master, N followers and the failure simulator, behind one facade.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::config::{ChaosConfig, SystemConfig};
use crate::entry::LogEntry;
use crate::error::{ReplicationError, Result};
use crate::follower::Follower;
use crate::master::Master;
use crate::node::Node;
use crate::simulator::{ChaosEvent, FailureSimulator, SharedRng};

pub const MASTER_ID: &str = "master";

/// The replication engine's public surface.
///
/// Writes and deletes go to the master. Reads are served by one available
/// follower picked at random, so they are eventually consistent: a read may
/// miss a write that has not replicated yet, or fail while every follower is
/// down.
pub struct ReplicationSystem {
    master: Arc<Master>,
    followers: Vec<Arc<Follower>>,
    rng: SharedRng,
    simulator: FailureSimulator,
}

impl ReplicationSystem {
    pub fn new(config: SystemConfig) -> Result<Self> {
        config.validate()?;
        let master = Master::new(MASTER_ID, config.replication_workers)?;
        let followers: Vec<_> = (0..config.followers)
            .map(|i| Follower::new(format!("follower-{i}"), &master))
            .collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let rng = Arc::new(Mutex::new(rng));
        let simulator = FailureSimulator::new(followers.clone(), Arc::clone(&rng));

        info!(followers = followers.len(), "replication system initialised");
        Ok(Self {
            master,
            followers,
            rng,
            simulator,
        })
    }

    /// Shorthand for a default configuration with `followers` followers.
    pub fn with_followers(followers: usize) -> Result<Self> {
        Self::new(SystemConfig::new(followers))
    }

    pub fn master(&self) -> &Arc<Master> {
        &self.master
    }

    pub fn followers(&self) -> &[Arc<Follower>] {
        &self.followers
    }

    pub fn follower(&self, id: &str) -> Option<&Arc<Follower>> {
        self.followers.iter().find(|follower| follower.id() == id)
    }

    /// Returns the sequence id assigned to the write.
    pub fn write(&self, key: &str, value: &str) -> Result<u64> {
        self.master.write(key, value)
    }

    /// `Ok(false)` when the master does not hold `key`.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.master.delete(key)
    }

    pub fn read(&self, key: &str) -> Result<Option<String>> {
        self.pick_available_follower()?.read(key)
    }

    /// Full store snapshot from one randomly chosen available follower.
    pub fn store_snapshot(&self) -> Result<HashMap<String, String>> {
        self.pick_available_follower()?.snapshot()
    }

    pub fn available_followers(&self) -> Vec<Arc<Follower>> {
        self.followers
            .iter()
            .filter(|follower| follower.is_available())
            .cloned()
            .collect()
    }

    fn pick_available_follower(&self) -> Result<Arc<Follower>> {
        let available = self.available_followers();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        available
            .choose(&mut *rng)
            .cloned()
            .ok_or(ReplicationError::AllFollowersDown)
    }

    /// Availability of every node, master included.
    pub fn node_statuses(&self) -> BTreeMap<String, bool> {
        std::iter::once(&*self.master as &dyn Node)
            .chain(self.followers.iter().map(|follower| &**follower as &dyn Node))
            .map(|node| (node.id().to_string(), node.is_available()))
            .collect()
    }

    /// Every entry in the master's log, from the first.
    pub fn logs(&self) -> Result<Vec<LogEntry>> {
        self.master.entries_after(0)
    }

    /// Downs or ups any node by id. Bringing a follower up starts recovery.
    pub fn set_node_available(&self, id: &str, available: bool) -> Result<()> {
        let node: &dyn Node = if id == self.master.id() {
            &*self.master
        } else {
            let follower = self
                .follower(id)
                .ok_or_else(|| ReplicationError::UnknownNode(id.to_string()))?;
            &**follower
        };
        if available {
            node.go_up();
        } else {
            node.go_down();
        }
        Ok(())
    }

    /// Starts (or retunes) the failure simulator with a whole-second period.
    pub fn start_failure_simulator(
        &self,
        failure_probability: f64,
        recovery_probability: f64,
        interval_secs: u64,
    ) -> Result<()> {
        if interval_secs == 0 {
            return Err(ReplicationError::InvalidConfig(
                "simulator interval must be at least one second".to_string(),
            ));
        }
        let config = ChaosConfig::new(
            failure_probability,
            recovery_probability,
            Duration::from_secs(interval_secs),
        )?;
        self.start_failure_simulator_with(config)
    }

    pub fn start_failure_simulator_with(&self, config: ChaosConfig) -> Result<()> {
        self.simulator.start(config)
    }

    pub fn is_failure_simulator_running(&self) -> bool {
        self.simulator.is_running()
    }

    pub fn stop_failure_simulator(&self) {
        self.simulator.stop();
    }

    /// Runs exactly one simulator round with `config` and reports what changed.
    pub fn simulate_failures_once(&self, config: &ChaosConfig) -> Vec<ChaosEvent> {
        self.simulator.tick(config)
    }

    /// Stops the simulator and releases the replication pool. Idempotent.
    pub fn shutdown(&self) {
        self.simulator.stop();
        self.master.shutdown();
    }
}

impl Drop for ReplicationSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_cover_every_node() {
        let system = ReplicationSystem::with_followers(3).unwrap();
        let statuses = system.node_statuses();
        assert_eq!(statuses.len(), 4);
        assert!(statuses.values().all(|up| *up));

        system.set_node_available("follower-1", false).unwrap();
        assert_eq!(system.node_statuses().get("follower-1"), Some(&false));
        assert!(matches!(
            system.set_node_available("follower-9", false),
            Err(ReplicationError::UnknownNode(_))
        ));
    }

    #[test]
    fn reads_fail_when_every_follower_is_down() {
        let system = ReplicationSystem::with_followers(2).unwrap();
        for follower in system.followers() {
            follower.go_down();
        }
        assert!(matches!(system.read("k"), Err(ReplicationError::AllFollowersDown)));
        assert!(matches!(
            system.store_snapshot(),
            Err(ReplicationError::AllFollowersDown)
        ));
    }

    #[test]
    fn logs_need_the_master() {
        let system = ReplicationSystem::with_followers(1).unwrap();
        system.write("k", "v").unwrap();
        assert_eq!(system.logs().unwrap().len(), 1);

        system.set_node_available(MASTER_ID, false).unwrap();
        assert!(system.logs().unwrap_err().is_node_down());
        assert!(system.write("k", "v2").is_err());
        assert_eq!(system.node_statuses().get(MASTER_ID), Some(&false));
    }

    #[test]
    fn zero_second_interval_is_rejected() {
        let system = ReplicationSystem::with_followers(1).unwrap();
        assert!(system.start_failure_simulator(0.1, 0.3, 0).is_err());
        assert!(system.start_failure_simulator(1.2, 0.3, 1).is_err());
        assert!(!system.is_failure_simulator_running());
    }

    #[test]
    fn oversized_interval_is_rejected_and_the_simulator_stays_usable() {
        let system = ReplicationSystem::with_followers(2).unwrap();
        assert!(matches!(
            system.start_failure_simulator(0.1, 0.3, u64::MAX),
            Err(ReplicationError::InvalidConfig(_))
        ));
        assert!(!system.is_failure_simulator_running());

        for follower in system.followers() {
            follower.go_down();
        }
        system
            .start_failure_simulator_with(ChaosConfig::calm(Duration::from_millis(10)).unwrap())
            .unwrap();
        assert!(system.is_failure_simulator_running());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while system.available_followers().len() < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(system.available_followers().len(), 2);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let system = ReplicationSystem::with_followers(2).unwrap();
        system.start_failure_simulator(0.0, 1.0, 1).unwrap();
        system.shutdown();
        system.shutdown();
        // Local writes still land on the master.
        assert_eq!(system.write("k", "v").unwrap(), 1);
    }
}
