// Single-Instance Cycle Detection
use super::{DetectionReport, Verdict, Witness};
use crate::config::{DetectionMode, TraceConfig};
use crate::error::{Error, Result};
use crate::graph::{EdgeKind, NodeId, ResourceAllocationGraph};
use crate::trace::{EventKind, TraceRecorder};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Stack frame: a gray node and the index of its next unchecked edge.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    next_edge: usize,
}

/// Depth-first cycle search over request and allocation edges.
///
/// With one instance per resource a cycle is both necessary and sufficient
/// for deadlock. Roots are processes in insertion order and edges are
/// followed in insertion order, so a graph always produces the same trace
/// and reports the same cycle. Only the first cycle found is reported.
pub struct CycleDetector<'g> {
    graph: &'g ResourceAllocationGraph,
    color: Vec<Color>,
    parent: Vec<Option<usize>>,
    stack: Vec<Frame>,
}

impl<'g> CycleDetector<'g> {
    /// Fails with `InvalidMode` if any resource has more than one instance.
    pub fn new(graph: &'g ResourceAllocationGraph) -> Result<Self> {
        if let Some((resource, instances)) = graph.multi_instance_resource() {
            return Err(Error::InvalidMode {
                resource: resource.clone(),
                instances,
            });
        }

        let nodes = graph.node_count();
        Ok(Self {
            graph,
            color: vec![Color::White; nodes],
            parent: vec![None; nodes],
            stack: Vec::new(),
        })
    }

    pub fn run(mut self, config: &TraceConfig) -> DetectionReport {
        let graph = self.graph;
        let mut recorder = TraceRecorder::new(config);
        debug!(nodes = graph.node_count(), edges = graph.edge_count(), "cycle detection started");

        for root in graph.process_indices() {
            if self.color[root] != Color::White {
                continue;
            }
            recorder.emit(0, EventKind::Start { node: self.id(root) });

            if let Some(cycle) = self.search(root, &mut recorder) {
                info!(cycle = ?cycle, steps = recorder.steps(), "deadlock detected");
                recorder.emit(0, EventKind::CycleDetected { cycle: cycle.clone() });
                return DetectionReport {
                    mode: DetectionMode::SingleInstance,
                    verdict: Verdict::Deadlocked {
                        witness: Witness::Cycle(cycle),
                    },
                    safe_sequence: None,
                    trace: recorder.finish(),
                };
            }
        }

        info!(steps = recorder.steps(), "no cycle found");
        recorder.emit(0, EventKind::NoCycle);
        DetectionReport {
            mode: DetectionMode::SingleInstance,
            verdict: Verdict::Safe,
            safe_sequence: None,
            trace: recorder.finish(),
        }
    }

    /// Explores everything reachable from `root`. Returns the first cycle.
    fn search(&mut self, root: usize, recorder: &mut TraceRecorder<'_>) -> Option<Vec<NodeId>> {
        let graph = self.graph;
        self.enter(root, recorder);

        while let Some(frame) = self.stack.last_mut() {
            let node = frame.node;
            let edges = graph.adjacency(node);

            if frame.next_edge == edges.len() {
                recorder.emit(self.stack.len(), EventKind::Backtrack { node: self.id(node) });
                self.color[node] = Color::Black;
                self.stack.pop();
                continue;
            }

            let neighbor = edges[frame.next_edge].target;
            frame.next_edge += 1;

            recorder.emit(
                self.stack.len(),
                EventKind::CheckEdge {
                    node: self.id(node),
                    neighbor: self.id(neighbor),
                    edge_type: EdgeKind::outgoing_from(graph.kind_at(node)),
                },
            );

            match self.color[neighbor] {
                Color::White => {
                    recorder.emit(
                        self.stack.len(),
                        EventKind::Dive {
                            node: self.id(node),
                            neighbor: self.id(neighbor),
                        },
                    );
                    self.parent[neighbor] = Some(node);
                    self.enter(neighbor, recorder);
                }
                Color::Gray => {
                    let cycle = self.reconstruct(node, neighbor);
                    recorder.emit(
                        self.stack.len(),
                        EventKind::CycleFound {
                            node: self.id(node),
                            neighbor: self.id(neighbor),
                            cycle: cycle.clone(),
                        },
                    );
                    return Some(cycle);
                }
                // Fully explored, nothing reachable from it closes a cycle
                Color::Black => {}
            }
        }

        None
    }

    fn enter(&mut self, node: usize, recorder: &mut TraceRecorder<'_>) {
        self.color[node] = Color::Gray;
        self.stack.push(Frame { node, next_edge: 0 });
        recorder.emit(
            self.stack.len(),
            EventKind::Visit {
                node: self.id(node),
                context: self.graph.context_at(node),
            },
        );
    }

    /// Walks parents from `node` back to `ancestor`, then closes the loop.
    fn reconstruct(&self, node: usize, ancestor: usize) -> Vec<NodeId> {
        let mut path = vec![node];
        let mut current = node;
        while current != ancestor {
            match self.parent[current] {
                Some(prev) => {
                    path.push(prev);
                    current = prev;
                }
                None => break,
            }
        }
        path.reverse();
        path.push(ancestor);
        path.into_iter().map(|idx| self.id(idx)).collect()
    }

    fn id(&self, idx: usize) -> NodeId {
        self.graph.node_id(idx).clone()
    }
}
