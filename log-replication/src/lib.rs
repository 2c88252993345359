//! In-process master/follower log replication with fault injection.
//!
//! One master accepts writes and deletes, records each one as a numbered
//! [`LogEntry`] and fans it out to every follower on a shared worker pool.
//! Followers apply entries strictly in sequence order. A follower that sees
//! a gap, or that comes back up after being down, pulls the entries it
//! missed from the master's log. Reads are served by a random live follower.
//!
//! A background [`FailureSimulator`](simulator::FailureSimulator) flips
//! followers down and up at random so recovery gets exercised.
//!
//! # Threads
//!
//! - **Caller**: drives [`ReplicationSystem`], usually from the shell
//! - **Replication workers**: a tokio pool running one delivery task per
//!   follower per entry, plus recovery pulls
//! - **Failure simulator**: one named thread with its own timer
//!
//! # Modules
//!
//! - [`system`]: the facade wiring master, followers and simulator together
//! - [`master`] / [`follower`]: the two node roles
//! - [`node`]: behaviour shared by both roles
//! - [`store`]: per-node data, log and applied index under one lock
//! - [`entry`]: the replicated log record
//! - [`pool`]: the replication worker pool
//! - [`simulator`]: random failure injection
//! - [`config`] / [`cli`]: tunables and their command-line flags
//! - [`protocol`] / [`shell`]: the interactive command language

pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod follower;
pub mod master;
pub mod node;
pub mod pool;
pub mod protocol;
pub mod shell;
pub mod simulator;
pub mod store;
pub mod system;

pub use config::{ChaosConfig, SystemConfig};
pub use entry::{LogEntry, Operation};
pub use error::{ReplicationError, Result};
pub use follower::Follower;
pub use master::Master;
pub use node::Node;
pub use simulator::{ChaosEvent, Transition};
pub use system::{MASTER_ID, ReplicationSystem};
