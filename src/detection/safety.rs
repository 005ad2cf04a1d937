// Multi-Instance Safety Check
use super::{DetectionReport, Verdict, Witness};
use crate::config::{DetectionMode, TraceConfig};
use crate::graph::{NodeId, ResourceAllocationGraph, Units};
use crate::trace::{EventKind, TraceRecorder};
use tracing::{debug, info};

/// Work/finish reduction over the allocation graph.
///
/// A process whose outstanding requests all fit in `work` is assumed to run
/// to completion and hand back everything it holds. When no further process
/// can complete, whatever is left unfinished is deadlocked. For graphs where
/// every resource has a single instance this agrees with cycle detection.
pub struct SafetyChecker<'g> {
    graph: &'g ResourceAllocationGraph,
    // Indexed by node; only resource slots are meaningful
    work: Vec<u32>,
    finished: Vec<bool>,
}

impl<'g> SafetyChecker<'g> {
    pub fn new(graph: &'g ResourceAllocationGraph) -> Self {
        let nodes = graph.node_count();
        let mut work = vec![0; nodes];
        for r in graph.resource_indices() {
            work[r] = graph.available_at(r);
        }

        Self {
            graph,
            work,
            finished: vec![false; nodes],
        }
    }

    pub fn run(mut self, config: &TraceConfig) -> DetectionReport {
        let graph = self.graph;
        let mut recorder = TraceRecorder::new(config);
        debug!(processes = graph.process_count(), resources = graph.resource_count(), "safety check started");

        let available = graph
            .resource_indices()
            .map(|r| Units::new(graph.node_id(r).clone(), self.work[r]))
            .collect();
        recorder.emit(0, EventKind::ReductionStarted { available });

        let mut sequence = Vec::new();
        while let Some(p) = self.next_runnable() {
            self.finished[p] = true;

            let mut released = Vec::new();
            for (r, units) in graph.held_at(p) {
                self.work[r] += units;
                released.push(Units::new(graph.node_id(r).clone(), units));
            }

            let node = graph.node_id(p).clone();
            recorder.emit(0, EventKind::ProcessCompletes { node: node.clone(), released });
            sequence.push(node);
        }

        let blocked: Vec<usize> = graph
            .process_indices()
            .filter(|&p| !self.finished[p])
            .collect();

        if blocked.is_empty() {
            info!(sequence = ?sequence, "safe sequence found");
            recorder.emit(0, EventKind::SafeSequence { sequence: sequence.clone() });
            return DetectionReport {
                mode: DetectionMode::MultiInstance,
                verdict: Verdict::Safe,
                safe_sequence: Some(sequence),
                trace: recorder.finish(),
            };
        }

        for &p in &blocked {
            recorder.emit(
                0,
                EventKind::Blocked {
                    node: graph.node_id(p).clone(),
                    context: graph.context_at(p),
                },
            );
        }

        let processes: Vec<NodeId> = blocked.iter().map(|&p| graph.node_id(p).clone()).collect();
        info!(processes = ?processes, "deadlock detected");
        recorder.emit(0, EventKind::DeadlockDetected { processes: processes.clone() });
        DetectionReport {
            mode: DetectionMode::MultiInstance,
            verdict: Verdict::Deadlocked {
                witness: Witness::Processes(processes),
            },
            safe_sequence: None,
            trace: recorder.finish(),
        }
    }

    /// First unfinished process, in insertion order, whose requests fit in `work`.
    fn next_runnable(&self) -> Option<usize> {
        let graph = self.graph;
        graph.process_indices().find(|&p| {
            !self.finished[p]
                && graph
                    .adjacency(p)
                    .iter()
                    .all(|adj| adj.units <= self.work[adj.target])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|&n| NodeId::from(n)).collect()
    }

    #[test]
    fn test_safe_by_sequential_completion() {
        // R1 has 2 units: P1 holds 1, P2 holds 1 and wants 1, P3 wants 1
        let mut graph = ResourceAllocationGraph::new();
        for p in ["P1", "P2", "P3"] {
            graph.add_process(p).unwrap();
        }
        graph.add_resource("R1", 2).unwrap();
        graph.allocate("R1", "P1").unwrap();
        graph.allocate("R1", "P2").unwrap();
        graph.request("P2", "R1").unwrap();
        graph.request("P3", "R1").unwrap();

        let report = SafetyChecker::new(&graph).run(&TraceConfig::default());
        assert!(report.verdict.is_safe());
        assert_eq!(report.safe_sequence, Some(ids(&["P1", "P2", "P3"])));

        match &report.trace.events()[0].kind {
            EventKind::ReductionStarted { available } => {
                assert_eq!(available, &vec![Units::new("R1", 0)]);
            }
            other => panic!("unexpected first event: {:?}", other),
        }
        match &report.trace.events()[1].kind {
            EventKind::ProcessCompletes { node, released } => {
                assert_eq!(node, "P1");
                assert_eq!(released, &vec![Units::new("R1", 1)]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unfinishable_subset() {
        // R1 has 2 units; P2 and P3 each hold one and want one more
        let mut graph = ResourceAllocationGraph::new();
        for p in ["P1", "P2", "P3"] {
            graph.add_process(p).unwrap();
        }
        graph.add_resource("R1", 2).unwrap();
        graph.add_resource("R2", 1).unwrap();
        graph.allocate("R1", "P2").unwrap();
        graph.allocate("R1", "P3").unwrap();
        graph.allocate("R2", "P1").unwrap();
        graph.request("P2", "R1").unwrap();
        graph.request("P3", "R1").unwrap();

        let report = SafetyChecker::new(&graph).run(&TraceConfig::default());
        assert_eq!(
            report.verdict.witness(),
            Some(&Witness::Processes(ids(&["P2", "P3"])))
        );
        assert!(report.safe_sequence.is_none());

        let blocked: Vec<_> = report
            .trace
            .kinds()
            .filter_map(|k| match k {
                EventKind::Blocked { node, .. } => Some(node.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(blocked, vec!["P2", "P3"]);
    }

    #[test]
    fn test_cycle_without_deadlock() {
        // P1 -> R1 -> P2 -> R2 -> P1 is a cycle, but R1 has a spare unit
        let mut graph = ResourceAllocationGraph::new();
        graph.add_process("P1").unwrap();
        graph.add_process("P2").unwrap();
        graph.add_resource("R1", 2).unwrap();
        graph.add_resource("R2", 1).unwrap();
        graph.allocate("R1", "P2").unwrap();
        graph.allocate("R2", "P1").unwrap();
        graph.request("P1", "R1").unwrap();
        graph.request("P2", "R2").unwrap();

        let report = SafetyChecker::new(&graph).run(&TraceConfig::default());
        assert!(report.verdict.is_safe());
        assert_eq!(report.safe_sequence, Some(ids(&["P1", "P2"])));
    }

    #[test]
    fn test_restarts_from_first_process_after_completion() {
        // P1 only becomes runnable once P2 releases
        let mut graph = ResourceAllocationGraph::new();
        for p in ["P1", "P2", "P3"] {
            graph.add_process(p).unwrap();
        }
        graph.add_resource("R1", 1).unwrap();
        graph.allocate("R1", "P2").unwrap();
        graph.request("P1", "R1").unwrap();

        let report = SafetyChecker::new(&graph).run(&TraceConfig::default());
        assert_eq!(report.safe_sequence, Some(ids(&["P2", "P1", "P3"])));
    }

    #[test]
    fn test_no_processes() {
        let mut graph = ResourceAllocationGraph::new();
        graph.add_resource("R1", 4).unwrap();
        let report = SafetyChecker::new(&graph).run(&TraceConfig::default());
        assert!(report.verdict.is_safe());
        assert_eq!(report.safe_sequence, Some(vec![]));
    }
}
