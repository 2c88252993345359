use thiserror::Error;

/// Failures surfaced by nodes and by the replication system.
///
/// None of these are fatal: a down node, a rejected entry or a missing
/// follower is reported to the caller and the rest of the system keeps going.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The addressed node is currently unavailable.
    #[error("node {node} is down")]
    NodeDown { node: String },

    /// A follower refused an entry that is not the next one in sequence.
    #[error("node {node} expected entry {expected} but received {received}")]
    OutOfOrder {
        node: String,
        expected: u64,
        received: u64,
    },

    #[error("all followers are down")]
    AllFollowersDown,

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The replication task pool or simulator runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ReplicationError {
    pub(crate) fn node_down(node: &str) -> Self {
        Self::NodeDown {
            node: node.to_string(),
        }
    }

    /// True when the rejected entry is ahead of the node, meaning entries
    /// in between were missed and a recovery pull is needed.
    ///
    /// Stale duplicates (`received < expected`) are not gaps.
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::OutOfOrder { expected, received, .. } if received > expected)
    }

    pub fn is_node_down(&self) -> bool {
        matches!(self, Self::NodeDown { .. })
    }
}

pub type Result<T, E = ReplicationError> = std::result::Result<T, E>;
