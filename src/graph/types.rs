// Resource Allocation Graph Types
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier shared by processes and resources. Both live in one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Process,
    Resource,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Process => f.write_str("process"),
            NodeKind::Resource => f.write_str("resource"),
        }
    }
}

/// Request edges run process -> resource, allocation edges resource -> process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Request,
    Allocation,
}

impl EdgeKind {
    /// Edge kind leaving a node of the given kind.
    pub fn outgoing_from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Process => EdgeKind::Request,
            NodeKind::Resource => EdgeKind::Allocation,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Request => f.write_str("request"),
            EdgeKind::Allocation => f.write_str("allocation"),
        }
    }
}

/// A node paired with a unit count (held, requested or released units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub node: NodeId,
    pub units: u32,
}

impl Units {
    pub fn new(node: impl Into<NodeId>, units: u32) -> Self {
        Units {
            node: node.into(),
            units,
        }
    }
}

/// Structured summary of a node's surroundings, derived on demand from the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum NodeContext {
    Process {
        holds: Vec<Units>,
        requests: Vec<Units>,
    },
    Resource {
        instances: u32,
        available: u32,
        holders: Vec<Units>,
        waiters: Vec<Units>,
    },
}

impl NodeContext {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeContext::Process { .. } => NodeKind::Process,
            NodeContext::Resource { .. } => NodeKind::Resource,
        }
    }
}
