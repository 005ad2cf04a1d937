//! Shared graph handle for concurrent hosts.
//!
//! Detection runs take the read lock, so any number of them proceed in
//! parallel. Mutators take the write lock and therefore never overlap a run.

use crate::config::DetectorConfig;
use crate::detection::{detect, DetectionReport};
use crate::error::Result;
use crate::graph::{NodeId, ResourceAllocationGraph};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<ResourceAllocationGraph>>,
}

impl SharedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: ResourceAllocationGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn add_process(&self, id: impl Into<NodeId>) -> Result<()> {
        self.inner.write().add_process(id)
    }

    pub fn add_resource(&self, id: impl Into<NodeId>, instances: u32) -> Result<()> {
        self.inner.write().add_resource(id, instances)
    }

    pub fn allocate(&self, resource: &str, process: &str) -> Result<()> {
        self.inner.write().allocate(resource, process)
    }

    pub fn request(&self, process: &str, resource: &str) -> Result<()> {
        self.inner.write().request(process, resource)
    }

    pub fn release(&self, resource: &str, process: &str) -> Result<()> {
        self.inner.write().release(resource, process)
    }

    pub fn withdraw_request(&self, process: &str, resource: &str) -> Result<()> {
        self.inner.write().withdraw_request(process, resource)
    }

    /// Runs detection while holding the read lock for the whole run.
    pub fn detect(&self, config: &DetectorConfig) -> Result<DetectionReport> {
        let graph = self.inner.read();
        detect(&graph, config)
    }

    /// Independent copy of the current graph.
    pub fn snapshot(&self) -> ResourceAllocationGraph {
        self.inner.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&ResourceAllocationGraph) -> R) -> R {
        f(&self.inner.read())
    }

    /// Applies several mutations under one write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut ResourceAllocationGraph) -> R) -> R {
        f(&mut self.inner.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_detection_runs() {
        let shared = SharedGraph::new();
        shared
            .write(|graph| -> Result<()> {
                graph.add_process("P1")?;
                graph.add_process("P2")?;
                graph.add_resource("R1", 1)?;
                graph.add_resource("R2", 1)?;
                graph.allocate("R1", "P1")?;
                graph.allocate("R2", "P2")?;
                graph.request("P1", "R2")?;
                graph.request("P2", "R1")
            })
            .unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let shared = shared.clone();
            handles.push(thread::spawn(move || {
                let report = shared.detect(&DetectorConfig::default()).unwrap();
                report.verdict
            }));
        }

        let verdicts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(verdicts.iter().all(|v| v.is_deadlocked()));
        assert!(verdicts.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let shared = SharedGraph::new();
        shared.add_process("P1").unwrap();
        shared.add_resource("R1", 1).unwrap();

        let snapshot = shared.snapshot();
        shared.allocate("R1", "P1").unwrap();

        assert_eq!(snapshot.edge_count(), 0);
        assert_eq!(shared.read(|graph| graph.edge_count()), 1);
    }
}
