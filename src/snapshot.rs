//! Read-only projections for presentation collaborators.
//!
//! The renderer, the status cards and the event log all consume these
//! views; none of them may mutate engine state. Node positions are
//! presentation state and live here, not in the engine: new nodes
//! scatter at random within the canvas, drags overwrite them, and
//! positions are pruned with the nodes they belong to.

use crate::engine::AllocationEngine;
use crate::graph::{EdgeKind, NodeId, NodeKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canvas bounds for initial node placement.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    /// Border kept clear when scattering new nodes.
    pub margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            margin: 60.0,
        }
    }
}

/// A node as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub x: f32,
    pub y: f32,
}

/// An edge as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeView {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// Status card for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCard {
    pub id: NodeId,
    pub capacity: usize,
    /// Holder count, denormalized for the card header.
    pub held: usize,
    /// Grant order.
    pub holders: Vec<NodeId>,
    /// FIFO order, head first.
    pub waiters: Vec<NodeId>,
}

/// Immutable view of the whole engine state.
///
/// Nodes and resource cards are in creation order, edges in insertion
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub resources: Vec<ResourceCard>,
}

/// Projects engine state into [`EngineSnapshot`]s and owns node
/// positions.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    layout: HashMap<NodeId, (f32, f32)>,
    config: LayoutConfig,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            layout: HashMap::new(),
            config,
        }
    }

    /// Overrides a node position (the drag interface).
    pub fn set_position(&mut self, id: &str, x: f32, y: f32) {
        self.layout.insert(id.to_string(), (x, y));
    }

    pub fn position(&self, id: &str) -> Option<(f32, f32)> {
        self.layout.get(id).copied()
    }

    /// Builds a fresh snapshot. Read-only with respect to the engine;
    /// only the layout bookkeeping on this builder changes.
    pub fn build(&mut self, engine: &AllocationEngine) -> EngineSnapshot {
        self.layout.retain(|id, _| engine.graph().contains(id));

        let mut nodes = Vec::with_capacity(engine.graph().nodes().len());
        for node in engine.graph().nodes() {
            let (x, y) = match self.layout.get(&node.id).copied() {
                Some(position) => position,
                None => {
                    let position = self.scatter();
                    self.layout.insert(node.id.clone(), position);
                    position
                }
            };
            nodes.push(NodeView {
                id: node.id.clone(),
                kind: node.kind,
                x,
                y,
            });
        }

        let edges = engine
            .graph()
            .edges()
            .iter()
            .map(|e| EdgeView {
                source: e.source.clone(),
                target: e.target.clone(),
                kind: e.kind,
            })
            .collect();

        let resources = engine
            .graph()
            .nodes()
            .iter()
            .filter(|n| n.kind == NodeKind::Resource)
            .filter_map(|n| {
                engine.resource(&n.id).map(|state| ResourceCard {
                    id: n.id.clone(),
                    capacity: state.capacity,
                    held: state.holders.len(),
                    holders: state.holders.clone(),
                    waiters: state.waiters.iter().cloned().collect(),
                })
            })
            .collect();

        EngineSnapshot {
            nodes,
            edges,
            resources,
        }
    }

    fn scatter(&self) -> (f32, f32) {
        let mut rng = rand::rng();
        let x = rng.random_range(self.config.margin..self.config.width - self.config.margin);
        let y = rng.random_range(self.config.margin..self.config.height - self.config.margin);
        (x, y)
    }
}
