//! Construction and failure-simulator parameters.

use std::time::Duration;

use crate::error::{ReplicationError, Result};

const DEFAULT_FOLLOWERS: usize = 3;
const DEFAULT_REPLICATION_WORKERS: usize = 5;

/// Longest accepted simulator period.
pub const MAX_CHAOS_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shape of a replication system: how many followers, how many replication
/// workers, and an optional seed for the shared random source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    pub followers: usize,
    pub replication_workers: usize,
    pub seed: Option<u64>,
}

impl SystemConfig {
    pub fn new(followers: usize) -> Self {
        Self {
            followers,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_replication_workers(mut self, workers: usize) -> Self {
        self.replication_workers = workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.followers == 0 {
            return Err(invalid("at least one follower is required"));
        }
        if self.replication_workers == 0 {
            return Err(invalid("at least one replication worker is required"));
        }
        Ok(())
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            followers: DEFAULT_FOLLOWERS,
            replication_workers: DEFAULT_REPLICATION_WORKERS,
            seed: None,
        }
    }
}

/// Parameters of the failure simulator.
///
/// Each tick, every up follower goes down with `failure_probability` and
/// every down follower comes back with `recovery_probability`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaosConfig {
    failure_probability: f64,
    recovery_probability: f64,
    interval: Duration,
}

impl ChaosConfig {
    pub fn new(
        failure_probability: f64,
        recovery_probability: f64,
        interval: Duration,
    ) -> Result<Self> {
        check_probability("failure probability", failure_probability)?;
        check_probability("recovery probability", recovery_probability)?;
        if interval.is_zero() {
            return Err(invalid("simulator interval must be non-zero"));
        }
        if interval > MAX_CHAOS_INTERVAL {
            return Err(invalid(&format!(
                "simulator interval must be at most {}s, got {}s",
                MAX_CHAOS_INTERVAL.as_secs(),
                interval.as_secs()
            )));
        }
        Ok(Self {
            failure_probability,
            recovery_probability,
            interval,
        })
    }

    /// No new failures, and every down follower recovers on the next tick.
    pub fn calm(interval: Duration) -> Result<Self> {
        Self::new(0.0, 1.0, interval)
    }

    pub fn failure_probability(&self) -> f64 {
        self.failure_probability
    }

    pub fn recovery_probability(&self) -> f64 {
        self.recovery_probability
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be within [0, 1], got {value}")))
    }
}

fn invalid(message: &str) -> ReplicationError {
    ReplicationError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SystemConfig::default();
        assert_eq!(config.followers, 3);
        assert_eq!(config.replication_workers, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_topologies() {
        assert!(SystemConfig::new(0).validate().is_err());
        assert!(SystemConfig::new(2)
            .with_replication_workers(0)
            .validate()
            .is_err());
        assert_eq!(SystemConfig::new(2).with_seed(7).seed, Some(7));
    }

    #[test]
    fn probabilities_must_be_within_unit_interval() {
        let second = Duration::from_secs(1);
        assert!(ChaosConfig::new(0.0, 1.0, second).is_ok());
        assert!(ChaosConfig::new(-0.1, 0.5, second).is_err());
        assert!(ChaosConfig::new(0.5, 1.5, second).is_err());
        assert!(ChaosConfig::new(f64::NAN, 0.5, second).is_err());
        assert!(ChaosConfig::new(0.5, 0.5, Duration::ZERO).is_err());
    }

    #[test]
    fn interval_is_capped_at_one_day() {
        assert!(ChaosConfig::new(0.1, 0.3, MAX_CHAOS_INTERVAL).is_ok());
        assert!(ChaosConfig::new(0.1, 0.3, MAX_CHAOS_INTERVAL + Duration::from_secs(1)).is_err());
        assert!(ChaosConfig::new(0.1, 0.3, Duration::from_secs(u64::MAX)).is_err());
    }

    #[test]
    fn calm_never_fails_and_always_recovers() {
        let calm = ChaosConfig::calm(Duration::from_millis(50)).unwrap();
        assert_eq!(calm.failure_probability(), 0.0);
        assert_eq!(calm.recovery_probability(), 1.0);
        assert_eq!(calm.interval(), Duration::from_millis(50));
    }
}
