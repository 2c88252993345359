use clap::Parser;

use crate::config::SystemConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Master/follower log replication with fault injection", long_about = None)]
pub struct Cli {
    /// Number of follower nodes to start.
    #[arg(long, default_value_t = 3)]
    pub followers: usize,

    /// Worker threads used for replication fan-out and recovery.
    #[arg(long, default_value_t = 5)]
    pub replication_workers: usize,

    /// Seed for follower selection and failure draws. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Chance that an up follower goes down on each simulator tick.
    #[arg(long, default_value_t = 0.1)]
    pub failure_probability: f64,

    /// Chance that a down follower comes back on each simulator tick.
    #[arg(long, default_value_t = 0.3)]
    pub recovery_probability: f64,

    /// Seconds between simulator ticks.
    #[arg(long, default_value_t = 5)]
    pub interval: u64,

    /// Start without the failure simulator.
    #[arg(long)]
    pub no_chaos: bool,
}

impl Cli {
    pub fn system_config(&self) -> SystemConfig {
        let config = SystemConfig::new(self.followers)
            .with_replication_workers(self.replication_workers);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}
