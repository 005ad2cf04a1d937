// Deadlock Detection Module
// Cycle detection, safety reduction, verdicts

pub mod cycle;
pub mod safety;

pub use cycle::*;
pub use safety::*;

use crate::config::{DetectionMode, DetectorConfig, TraceConfig};
use crate::error::Result;
use crate::graph::{NodeId, ResourceAllocationGraph};
use crate::trace::EventTrace;
use serde::{Deserialize, Serialize};

/// Evidence behind a deadlock verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "nodes", rename_all = "snake_case")]
pub enum Witness {
    /// Closed walk `[n1, ..., nk, n1]` from the cycle detector
    Cycle(Vec<NodeId>),
    /// Mutually blocked processes from the safety reduction
    Processes(Vec<NodeId>),
}

impl Witness {
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Witness::Cycle(nodes) | Witness::Processes(nodes) => nodes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Deadlocked { witness: Witness },
}

impl Verdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }

    pub fn is_deadlocked(&self) -> bool {
        !self.is_safe()
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            Verdict::Safe => None,
            Verdict::Deadlocked { witness } => Some(witness),
        }
    }
}

/// Outcome of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Detector that actually ran (never `Auto`)
    pub mode: DetectionMode,
    pub verdict: Verdict,
    /// Completion order found by the safety reduction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_sequence: Option<Vec<NodeId>>,
    pub trace: EventTrace,
}

impl DetectionReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs the detector selected by `config.mode` over `graph`.
pub fn detect(graph: &ResourceAllocationGraph, config: &DetectorConfig) -> Result<DetectionReport> {
    detect_with(graph, config.mode, &config.trace)
}

pub fn detect_with(
    graph: &ResourceAllocationGraph,
    mode: DetectionMode,
    trace: &TraceConfig,
) -> Result<DetectionReport> {
    match mode.resolve(graph) {
        DetectionMode::MultiInstance => Ok(SafetyChecker::new(graph).run(trace)),
        _ => Ok(CycleDetector::new(graph)?.run(trace)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn multi_instance_graph() -> ResourceAllocationGraph {
        let mut graph = ResourceAllocationGraph::new();
        graph.add_process("P1").unwrap();
        graph.add_resource("R1", 2).unwrap();
        graph.allocate("R1", "P1").unwrap();
        graph
    }

    #[test]
    fn test_auto_mode_selects_detector() {
        let graph = multi_instance_graph();
        let report = detect(&graph, &DetectorConfig::default()).unwrap();
        assert_eq!(report.mode, DetectionMode::MultiInstance);

        let mut graph = ResourceAllocationGraph::new();
        graph.add_process("P1").unwrap();
        let report = detect(&graph, &DetectorConfig::default()).unwrap();
        assert_eq!(report.mode, DetectionMode::SingleInstance);
    }

    #[test]
    fn test_forced_single_mode_on_multi_graph() {
        let graph = multi_instance_graph();
        let err = detect_with(&graph, DetectionMode::SingleInstance, &TraceConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMode { .. }));
    }

    #[test]
    fn test_verdict_json_shape() {
        let verdict = Verdict::Deadlocked {
            witness: Witness::Cycle(vec![NodeId::from("P1"), NodeId::from("P1")]),
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "deadlocked");
        assert_eq!(json["witness"]["type"], "cycle");
        assert_eq!(json["witness"]["nodes"][0], "P1");

        let json = serde_json::to_value(&Verdict::Safe).unwrap();
        assert_eq!(json["status"], "safe");
    }
}
