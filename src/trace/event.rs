// Trace Event Types
use crate::graph::{EdgeKind, NodeContext, NodeId, Units};
use serde::{Deserialize, Serialize};

/// One recorded algorithm step.
///
/// `seq` numbers every step the algorithm took, including steps dropped by a
/// capture limit, so gaps show where recording was cut. `depth` is the DFS
/// stack height when the step was emitted (always 0 for the reduction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub seq: u64,
    pub depth: usize,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Structured step record. The presentation layer maps `kind` to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    // Cycle detection
    Start {
        node: NodeId,
    },
    Visit {
        node: NodeId,
        context: NodeContext,
    },
    CheckEdge {
        node: NodeId,
        neighbor: NodeId,
        edge_type: EdgeKind,
    },
    Dive {
        node: NodeId,
        neighbor: NodeId,
    },
    CycleFound {
        node: NodeId,
        neighbor: NodeId,
        cycle: Vec<NodeId>,
    },
    Backtrack {
        node: NodeId,
    },
    NoCycle,
    CycleDetected {
        cycle: Vec<NodeId>,
    },

    // Safety reduction
    ReductionStarted {
        available: Vec<Units>,
    },
    ProcessCompletes {
        node: NodeId,
        released: Vec<Units>,
    },
    Blocked {
        node: NodeId,
        context: NodeContext,
    },
    SafeSequence {
        sequence: Vec<NodeId>,
    },
    DeadlockDetected {
        processes: Vec<NodeId>,
    },
}

impl EventKind {
    /// Stable snake_case name, identical to the serialized `kind` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Start { .. } => "start",
            EventKind::Visit { .. } => "visit",
            EventKind::CheckEdge { .. } => "check_edge",
            EventKind::Dive { .. } => "dive",
            EventKind::CycleFound { .. } => "cycle_found",
            EventKind::Backtrack { .. } => "backtrack",
            EventKind::NoCycle => "no_cycle",
            EventKind::CycleDetected { .. } => "cycle_detected",
            EventKind::ReductionStarted { .. } => "reduction_started",
            EventKind::ProcessCompletes { .. } => "process_completes",
            EventKind::Blocked { .. } => "blocked",
            EventKind::SafeSequence { .. } => "safe_sequence",
            EventKind::DeadlockDetected { .. } => "deadlock_detected",
        }
    }

    /// Verdict-carrying events. Exactly one ends every run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::NoCycle
                | EventKind::CycleDetected { .. }
                | EventKind::SafeSequence { .. }
                | EventKind::DeadlockDetected { .. }
        )
    }

    /// Primary node of the step, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            EventKind::Start { node }
            | EventKind::Visit { node, .. }
            | EventKind::CheckEdge { node, .. }
            | EventKind::Dive { node, .. }
            | EventKind::CycleFound { node, .. }
            | EventKind::Backtrack { node }
            | EventKind::ProcessCompletes { node, .. }
            | EventKind::Blocked { node, .. } => Some(node),
            _ => None,
        }
    }

    pub fn neighbor(&self) -> Option<&NodeId> {
        match self {
            EventKind::CheckEdge { neighbor, .. }
            | EventKind::Dive { neighbor, .. }
            | EventKind::CycleFound { neighbor, .. } => Some(neighbor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shape() {
        let event = TraceEvent {
            seq: 3,
            depth: 1,
            kind: EventKind::CheckEdge {
                node: NodeId::from("P1"),
                neighbor: NodeId::from("R2"),
                edge_type: EdgeKind::Request,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "check_edge");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["node"], "P1");
        assert_eq!(json["neighbor"], "R2");
        assert_eq!(json["edge_type"], "request");
    }

    #[test]
    fn test_name_matches_tag() {
        let kinds = [
            EventKind::NoCycle,
            EventKind::Backtrack { node: NodeId::from("R1") },
            EventKind::DeadlockDetected { processes: vec![] },
        ];
        for kind in kinds {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json["kind"], kind.name());
        }
    }

    #[test]
    fn test_terminal_events() {
        assert!(EventKind::NoCycle.is_terminal());
        assert!(EventKind::CycleDetected { cycle: vec![] }.is_terminal());
        assert!(!EventKind::Start { node: NodeId::from("P1") }.is_terminal());
    }
}
