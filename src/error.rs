use crate::graph::{EdgeKind, NodeId, NodeKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    #[error("Unknown {expected}: {id}")]
    UnknownNode { id: NodeId, expected: NodeKind },

    #[error("Unknown node: {0}")]
    UnknownId(NodeId),

    #[error("Capacity exceeded: {resource} has {instances} instance(s)")]
    CapacityExceeded { resource: NodeId, instances: u32 },

    #[error("{kind} edge not found: {from} -> {to}")]
    EdgeNotFound {
        from: NodeId,
        to: NodeId,
        kind: EdgeKind,
    },

    #[error("Single-instance detection invoked on multi-instance resource {resource} ({instances} instances)")]
    InvalidMode { resource: NodeId, instances: u32 },

    #[error("Invalid instance count for {0}: must be at least 1")]
    InvalidInstanceCount(NodeId),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_offending_ids() {
        let err = Error::UnknownNode {
            id: NodeId::from("P9"),
            expected: NodeKind::Process,
        };
        assert_eq!(err.to_string(), "Unknown process: P9");

        let err = Error::EdgeNotFound {
            from: NodeId::from("R1"),
            to: NodeId::from("P1"),
            kind: EdgeKind::Allocation,
        };
        assert_eq!(err.to_string(), "allocation edge not found: R1 -> P1");
    }
}
