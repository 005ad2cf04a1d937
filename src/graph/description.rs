//! Graph descriptions: the plain-data input format of the engine.
//!
//! A [`GraphDescription`] lists process ids, `(resource, instances)` pairs,
//! `(resource, process)` allocations and `(process, resource)` requests. An
//! edge entry may carry a third element, the unit count. Building it replays
//! every entry through the graph mutators, so malformed input fails with the
//! same errors as direct construction.
//!
//! [`BankerMatrices`] accepts the classic allocation/max/total matrix form and
//! converts it to a description, with `need = max - allocation` becoming
//! request units.

use super::rag::ResourceAllocationGraph;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One edge of a description: `[from, to]` for a single unit, or
/// `[from, to, units]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeEntry {
    Unit(String, String),
    Counted(String, String, u32),
}

impl EdgeEntry {
    pub fn new(from: impl Into<String>, to: impl Into<String>, units: u32) -> Self {
        match units {
            1 => EdgeEntry::Unit(from.into(), to.into()),
            n => EdgeEntry::Counted(from.into(), to.into(), n),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            EdgeEntry::Unit(from, _) | EdgeEntry::Counted(from, _, _) => from,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            EdgeEntry::Unit(_, to) | EdgeEntry::Counted(_, to, _) => to,
        }
    }

    pub fn units(&self) -> u32 {
        match self {
            EdgeEntry::Unit(..) => 1,
            EdgeEntry::Counted(_, _, units) => *units,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescription {
    #[serde(default)]
    pub processes: Vec<String>,

    /// `(resource id, instance count)`
    #[serde(default)]
    pub resources: Vec<(String, u32)>,

    /// `(resource id, process id[, units])`
    #[serde(default)]
    pub allocations: Vec<EdgeEntry>,

    /// `(process id, resource id[, units])`
    #[serde(default)]
    pub requests: Vec<EdgeEntry>,
}

impl GraphDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading graph description");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the graph. Processes come first, then resources, allocations
    /// and requests, each in listed order.
    pub fn build(&self) -> Result<ResourceAllocationGraph> {
        let mut graph = ResourceAllocationGraph::new();
        for process in &self.processes {
            graph.add_process(process.as_str())?;
        }
        for (resource, instances) in &self.resources {
            graph.add_resource(resource.as_str(), *instances)?;
        }
        for entry in &self.allocations {
            graph.allocate_units(entry.source(), entry.target(), entry.units())?;
        }
        for entry in &self.requests {
            graph.request_units(entry.source(), entry.target(), entry.units())?;
        }
        Ok(graph)
    }

    /// Captures the current state of a graph. `build()` on the result yields
    /// an equivalent graph with the same iteration order.
    pub fn from_graph(graph: &ResourceAllocationGraph) -> Self {
        let mut description = GraphDescription {
            processes: graph.processes().map(|id| id.to_string()).collect(),
            resources: graph
                .resources()
                .map(|(id, instances)| (id.to_string(), instances))
                .collect(),
            ..Default::default()
        };

        for r in graph.resource_indices() {
            for adj in graph.adjacency(r) {
                description.allocations.push(EdgeEntry::new(
                    graph.node_id(r).as_str(),
                    graph.node_id(adj.target).as_str(),
                    adj.units,
                ));
            }
        }
        for p in graph.process_indices() {
            for adj in graph.adjacency(p) {
                description.requests.push(EdgeEntry::new(
                    graph.node_id(p).as_str(),
                    graph.node_id(adj.target).as_str(),
                    adj.units,
                ));
            }
        }
        description
    }
}

/// Banker-style matrices. Rows follow `processes`, columns follow `resources`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankerMatrices {
    /// `(resource id, total instances)`
    pub resources: Vec<(String, u32)>,
    pub processes: Vec<String>,
    pub allocation: Vec<Vec<u32>>,
    pub max: Vec<Vec<u32>>,
}

impl BankerMatrices {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn to_description(&self) -> Result<GraphDescription> {
        let width = self.resources.len();
        let rows = self.processes.len();
        if self.allocation.len() != rows || self.max.len() != rows {
            return Err(Error::InvalidData(format!(
                "expected {} matrix rows, got allocation={} max={}",
                rows,
                self.allocation.len(),
                self.max.len()
            )));
        }

        let mut description = GraphDescription {
            processes: self.processes.clone(),
            resources: self.resources.clone(),
            ..Default::default()
        };

        for (row, process) in self.processes.iter().enumerate() {
            let held = &self.allocation[row];
            let max = &self.max[row];
            if held.len() != width || max.len() != width {
                return Err(Error::InvalidData(format!(
                    "row for {} must have {} columns",
                    process, width
                )));
            }

            for (col, (resource, _)) in self.resources.iter().enumerate() {
                if held[col] > max[col] {
                    return Err(Error::InvalidData(format!(
                        "allocation ({}) exceeds max ({}) for {} and {}",
                        held[col], max[col], process, resource
                    )));
                }
                if held[col] > 0 {
                    description
                        .allocations
                        .push(EdgeEntry::new(resource.as_str(), process.as_str(), held[col]));
                }
                let need = max[col] - held[col];
                if need > 0 {
                    description
                        .requests
                        .push(EdgeEntry::new(process.as_str(), resource.as_str(), need));
                }
            }
        }
        Ok(description)
    }
}
