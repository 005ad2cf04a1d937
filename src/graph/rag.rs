// Resource Allocation Graph
use super::types::*;
use crate::error::{Error, Result};
use ahash::AHashMap;
use tracing::debug;

/// One outgoing edge with its unit multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Adjacency {
    pub(crate) target: usize,
    pub(crate) units: u32,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    id: NodeId,
    kind: NodeKind,
    // Zero for processes
    instances: u32,
    // Insertion order of currently present edges
    outgoing: Vec<Adjacency>,
    incoming: Vec<usize>,
}

/// Processes, resources and the allocation/request edges between them.
///
/// Nodes and edges keep their insertion order, which is what makes detection
/// runs reproducible. Every mutator validates first and only then touches the
/// edge sets, so a failed call leaves the graph unchanged.
#[derive(Debug, Clone, Default)]
pub struct ResourceAllocationGraph {
    nodes: Vec<NodeEntry>,
    index: AHashMap<NodeId, usize>,
}

impl ResourceAllocationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_process(&mut self, id: impl Into<NodeId>) -> Result<()> {
        self.insert_node(id.into(), NodeKind::Process, 0)
    }

    pub fn add_resource(&mut self, id: impl Into<NodeId>, instances: u32) -> Result<()> {
        let id = id.into();
        if instances == 0 {
            return Err(Error::InvalidInstanceCount(id));
        }
        self.insert_node(id, NodeKind::Resource, instances)
    }

    /// Adds a resource with exactly one instance.
    pub fn add_single_resource(&mut self, id: impl Into<NodeId>) -> Result<()> {
        self.add_resource(id, 1)
    }

    fn insert_node(&mut self, id: NodeId, kind: NodeKind, instances: u32) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }

        debug!(node = %id, %kind, instances, "adding node");
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(NodeEntry {
            id,
            kind,
            instances,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        Ok(())
    }

    /// Hands one unit of `resource` to `process`.
    pub fn allocate(&mut self, resource: &str, process: &str) -> Result<()> {
        self.allocate_units(resource, process, 1)
    }

    /// Hands `units` units of `resource` to `process` in one step. Capacity is
    /// checked for the whole count; zero units is a no-op.
    pub fn allocate_units(&mut self, resource: &str, process: &str, units: u32) -> Result<()> {
        let r = self.lookup(resource, NodeKind::Resource)?;
        let p = self.lookup(process, NodeKind::Process)?;

        let instances = self.nodes[r].instances;
        if u64::from(self.allocated_at(r)) + u64::from(units) > u64::from(instances) {
            return Err(Error::CapacityExceeded {
                resource: self.nodes[r].id.clone(),
                instances,
            });
        }

        debug!(resource, process, units, "allocating units");
        self.add_units(r, p, units);
        Ok(())
    }

    /// Records that `process` waits for one more unit of `resource`.
    ///
    /// Requesting a fully allocated resource is the normal deadlock
    /// precondition and is accepted. Only a request that, together with the
    /// units the process already holds, would exceed the resource's total
    /// instances is refused.
    pub fn request(&mut self, process: &str, resource: &str) -> Result<()> {
        self.request_units(process, resource, 1)
    }

    /// Bulk form of [`request`](Self::request).
    pub fn request_units(&mut self, process: &str, resource: &str, units: u32) -> Result<()> {
        let p = self.lookup(process, NodeKind::Process)?;
        let r = self.lookup(resource, NodeKind::Resource)?;

        let instances = self.nodes[r].instances;
        let held = u64::from(self.units_between(r, p));
        let requested = u64::from(self.units_between(p, r));
        if held + requested + u64::from(units) > u64::from(instances) {
            return Err(Error::CapacityExceeded {
                resource: self.nodes[r].id.clone(),
                instances,
            });
        }

        debug!(process, resource, units, "requesting units");
        self.add_units(p, r, units);
        Ok(())
    }

    /// Returns one unit of `resource` held by `process`.
    pub fn release(&mut self, resource: &str, process: &str) -> Result<()> {
        let r = self.lookup(resource, NodeKind::Resource)?;
        let p = self.lookup(process, NodeKind::Process)?;

        if !self.remove_unit(r, p) {
            return Err(Error::EdgeNotFound {
                from: self.nodes[r].id.clone(),
                to: self.nodes[p].id.clone(),
                kind: EdgeKind::Allocation,
            });
        }
        debug!(resource, process, "released unit");
        Ok(())
    }

    /// Drops one outstanding request unit of `process` for `resource`.
    pub fn withdraw_request(&mut self, process: &str, resource: &str) -> Result<()> {
        let p = self.lookup(process, NodeKind::Process)?;
        let r = self.lookup(resource, NodeKind::Resource)?;

        if !self.remove_unit(p, r) {
            return Err(Error::EdgeNotFound {
                from: self.nodes[p].id.clone(),
                to: self.nodes[r].id.clone(),
                kind: EdgeKind::Request,
            });
        }
        debug!(process, resource, "withdrew request");
        Ok(())
    }

    /// Outgoing edges of `id` in insertion order. The iterator is `Clone`, so
    /// it can be restarted from any point.
    pub fn neighbors(&self, id: &str) -> Result<Neighbors<'_>> {
        let idx = self.find(id)?;
        Ok(Neighbors {
            graph: self,
            kind: EdgeKind::outgoing_from(self.nodes[idx].kind),
            edges: self.nodes[idx].outgoing.iter(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.index.get(id).map(|&idx| self.nodes[idx].kind)
    }

    /// Processes in insertion order.
    pub fn processes(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Process)
            .map(|n| &n.id)
    }

    /// Resources with their instance counts, in insertion order.
    pub fn resources(&self) -> impl Iterator<Item = (&NodeId, u32)> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Resource)
            .map(|n| (&n.id, n.instances))
    }

    pub fn instances(&self, resource: &str) -> Result<u32> {
        let r = self.lookup(resource, NodeKind::Resource)?;
        Ok(self.nodes[r].instances)
    }

    pub fn allocated_units(&self, resource: &str) -> Result<u32> {
        let r = self.lookup(resource, NodeKind::Resource)?;
        Ok(self.allocated_at(r))
    }

    pub fn available(&self, resource: &str) -> Result<u32> {
        let r = self.lookup(resource, NodeKind::Resource)?;
        Ok(self.available_at(r))
    }

    /// Resources held by `process`, with unit counts.
    pub fn holdings(&self, process: &str) -> Result<Vec<Units>> {
        let p = self.lookup(process, NodeKind::Process)?;
        Ok(self.holdings_at(p))
    }

    /// Outstanding requests of `process`, with unit counts.
    pub fn requests(&self, process: &str) -> Result<Vec<Units>> {
        let p = self.lookup(process, NodeKind::Process)?;
        Ok(self.outgoing_units(p))
    }

    pub fn context(&self, id: &str) -> Result<NodeContext> {
        let idx = self.find(id)?;
        Ok(self.context_at(idx))
    }

    /// True when every resource has exactly one instance.
    pub fn is_single_instance(&self) -> bool {
        self.multi_instance_resource().is_none()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn process_count(&self) -> usize {
        self.processes().count()
    }

    pub fn resource_count(&self) -> usize {
        self.nodes.len() - self.process_count()
    }

    /// Distinct (from, to) edges, ignoring unit multiplicity.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.outgoing.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Index-level accessors used by the detectors.

    pub(crate) fn multi_instance_resource(&self) -> Option<(&NodeId, u32)> {
        self.resources().find(|&(_, instances)| instances > 1)
    }

    pub(crate) fn process_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Process)
            .map(|(idx, _)| idx)
    }

    pub(crate) fn resource_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Resource)
            .map(|(idx, _)| idx)
    }

    pub(crate) fn node_id(&self, idx: usize) -> &NodeId {
        &self.nodes[idx].id
    }

    pub(crate) fn kind_at(&self, idx: usize) -> NodeKind {
        self.nodes[idx].kind
    }

    pub(crate) fn adjacency(&self, idx: usize) -> &[Adjacency] {
        &self.nodes[idx].outgoing
    }

    pub(crate) fn available_at(&self, r: usize) -> u32 {
        self.nodes[r].instances - self.allocated_at(r)
    }

    /// Held units of process `p` as (resource index, units), in allocation order.
    pub(crate) fn held_at(&self, p: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.nodes[p]
            .incoming
            .iter()
            .map(move |&r| (r, self.units_between(r, p)))
    }

    pub(crate) fn context_at(&self, idx: usize) -> NodeContext {
        let entry = &self.nodes[idx];
        match entry.kind {
            NodeKind::Process => NodeContext::Process {
                holds: self.holdings_at(idx),
                requests: self.outgoing_units(idx),
            },
            NodeKind::Resource => NodeContext::Resource {
                instances: entry.instances,
                available: self.available_at(idx),
                holders: self.outgoing_units(idx),
                waiters: entry
                    .incoming
                    .iter()
                    .map(|&p| Units::new(self.nodes[p].id.clone(), self.units_between(p, idx)))
                    .collect(),
            },
        }
    }

    fn holdings_at(&self, p: usize) -> Vec<Units> {
        self.held_at(p)
            .map(|(r, units)| Units::new(self.nodes[r].id.clone(), units))
            .collect()
    }

    fn outgoing_units(&self, idx: usize) -> Vec<Units> {
        self.nodes[idx]
            .outgoing
            .iter()
            .map(|adj| Units::new(self.nodes[adj.target].id.clone(), adj.units))
            .collect()
    }

    fn allocated_at(&self, r: usize) -> u32 {
        self.nodes[r].outgoing.iter().map(|adj| adj.units).sum()
    }

    fn units_between(&self, from: usize, to: usize) -> u32 {
        self.nodes[from]
            .outgoing
            .iter()
            .find(|adj| adj.target == to)
            .map_or(0, |adj| adj.units)
    }

    fn find(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownId(NodeId::from(id)))
    }

    fn lookup(&self, id: &str, expected: NodeKind) -> Result<usize> {
        match self.index.get(id) {
            Some(&idx) if self.nodes[idx].kind == expected => Ok(idx),
            _ => Err(Error::UnknownNode {
                id: NodeId::from(id),
                expected,
            }),
        }
    }

    fn add_units(&mut self, from: usize, to: usize, units: u32) {
        if units == 0 {
            return;
        }
        let outgoing = &mut self.nodes[from].outgoing;
        if let Some(adj) = outgoing.iter_mut().find(|adj| adj.target == to) {
            adj.units += units;
            return;
        }
        outgoing.push(Adjacency { target: to, units });
        self.nodes[to].incoming.push(from);
    }

    fn remove_unit(&mut self, from: usize, to: usize) -> bool {
        let outgoing = &mut self.nodes[from].outgoing;
        let Some(pos) = outgoing.iter().position(|adj| adj.target == to) else {
            return false;
        };

        if outgoing[pos].units > 1 {
            outgoing[pos].units -= 1;
        } else {
            outgoing.remove(pos);
            self.nodes[to].incoming.retain(|&src| src != from);
        }
        true
    }
}

/// Lazy iterator over `(edge kind, neighbor)` pairs of one node.
#[derive(Debug, Clone)]
pub struct Neighbors<'g> {
    graph: &'g ResourceAllocationGraph,
    kind: EdgeKind,
    edges: std::slice::Iter<'g, Adjacency>,
}

impl<'g> Iterator for Neighbors<'g> {
    type Item = (EdgeKind, &'g NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let adj = self.edges.next()?;
        Some((self.kind, self.graph.node_id(adj.target)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

impl ExactSizeIterator for Neighbors<'_> {}
