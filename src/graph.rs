//! Resource-allocation graph storage.
//!
//! The edge list is the single source of truth. The adjacency projection
//! is derived from it on demand and cached; it is never maintained
//! incrementally, so it cannot drift from the edges it was built from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node id in the allocation graph (`"P<n>"` for processes, `"R<n>"` for
/// resources; one shared namespace with disjoint prefixes).
pub type NodeId = String;

/// The role a node plays in the allocation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Process,
    Resource,
}

/// A node. Nodes are never removed individually; only a full reset
/// destroys them, so an id is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

/// Direction and meaning of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Resource → process: the resource is currently held by the process.
    Alloc,
    /// Process → resource: the process is waiting on the resource.
    Request,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// Error type for graph mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} already exists")]
    DuplicateId(NodeId),
}

/// Derived successor map over the current edge set.
///
/// Roots iterate in node-creation order and successors in edge-insertion
/// order, so any traversal over it is reproducible.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    order: Vec<NodeId>,
    successors: HashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    /// All node ids, in creation order.
    pub fn node_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Direct successors of `id`, in edge-insertion order.
    pub fn successors(&self, id: &str) -> &[NodeId] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns a copy with one hypothetical edge appended. The committed
    /// projection is left untouched.
    pub fn with_edge(&self, from: &str, to: &str) -> Adjacency {
        let mut copy = self.clone();
        if !copy.successors.contains_key(from) {
            copy.order.push(from.to_string());
        }
        copy.successors
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        copy
    }

    /// Returns a copy with the first occurrence of the edge `from → to`
    /// removed, if present.
    pub fn without_edge(&self, from: &str, to: &str) -> Adjacency {
        let mut copy = self.clone();
        if let Some(successors) = copy.successors.get_mut(from) {
            if let Some(at) = successors.iter().position(|s| s == to) {
                successors.remove(at);
            }
        }
        copy
    }
}

/// Node and edge collections plus the cached adjacency projection.
///
/// No cycle-safety validation happens here; that is the caller's job.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    adjacency: Adjacency,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, preserving creation order.
    pub fn add_node(&mut self, id: impl Into<NodeId>, kind: NodeKind) -> Result<(), GraphError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(Node { id, kind });
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.index.get(id).map(|&i| self.nodes[i].kind)
    }

    /// Appends an edge. The cached adjacency is stale until the next
    /// [`rebuild_adjacency`](Self::rebuild_adjacency).
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Removes the first edge matching the predicate, if any. One call
    /// undoes one transition, so holder and queue bookkeeping stays in
    /// step with the edge list even when a pair repeats. The cached
    /// adjacency is stale until the next rebuild.
    pub fn remove_edge_once<F>(&mut self, pred: F)
    where
        F: FnMut(&Edge) -> bool,
    {
        if let Some(at) = self.edges.iter().position(pred) {
            self.edges.remove(at);
        }
    }

    /// Rebuilds the adjacency projection from the full edge list, O(V+E).
    /// Every node gets an entry, sources and successors keep their
    /// insertion order.
    pub fn rebuild_adjacency(&mut self) -> &Adjacency {
        let mut adjacency = Adjacency {
            order: Vec::with_capacity(self.nodes.len()),
            successors: HashMap::with_capacity(self.nodes.len()),
        };
        for node in &self.nodes {
            adjacency.order.push(node.id.clone());
            adjacency.successors.insert(node.id.clone(), Vec::new());
        }
        for edge in &self.edges {
            adjacency
                .successors
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        self.adjacency = adjacency;
        &self.adjacency
    }

    /// The adjacency as of the last rebuild.
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// All nodes, in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Drops nodes, edges and the cached adjacency together.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.edges.clear();
        self.adjacency = Adjacency::default();
    }
}
