//! Allocation Engine Implementation
//!
//! Owns the graph, the per-resource capacity/holder/waiter state and the
//! id counters, and implements the admission protocol: request, release
//! with queue draining, and whole-system reset.
//!
//! Execution is command-at-a-time: every operation runs to completion
//! before the next one is accepted, and "waiting" is queue membership,
//! never a blocked thread.

use crate::cycle;
use crate::graph::{Edge, EdgeKind, GraphError, GraphStore, NodeId, NodeKind};
use crate::metrics::EngineMetrics;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity assigned to a new resource when the operator supplies a
    /// value of zero or below.
    pub default_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_capacity: 1,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for admission operations.
///
/// Every variant is recoverable and leaves the engine exactly as it was:
/// no partial edge or queue mutation survives a failed check.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("unknown node: {id}")]
    UnknownNode { id: NodeId },
    #[error("duplicate node id: {id}")]
    DuplicateId { id: NodeId },
    #[error("{id} is not a resource")]
    NotAResource { id: NodeId },
    #[error("{id} has no allocated process")]
    NothingToRelease { id: NodeId },
    #[error("{process} -> {resource} denied: the grant would close a cycle")]
    DeniedCycle { process: NodeId, resource: NodeId },
}

impl From<GraphError> for EngineError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::DuplicateId(id) => EngineError::DuplicateId { id },
        }
    }
}

// ============================================================================
// RESOURCE STATE
// ============================================================================

/// Per-resource allocation bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    /// Instance count, fixed at creation.
    pub capacity: usize,
    /// Current holders, in grant order.
    pub holders: Vec<NodeId>,
    /// Blocked processes, FIFO with the head first.
    pub waiters: VecDeque<NodeId>,
}

impl ResourceState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            holders: Vec::new(),
            waiters: VecDeque::new(),
        }
    }

    /// Unallocated instance count.
    pub fn free(&self) -> usize {
        self.capacity - self.holders.len()
    }

    pub fn is_saturated(&self) -> bool {
        self.holders.len() >= self.capacity
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Outcome of a request that passed the cycle guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    /// A free instance existed; the allocation edge is committed.
    Granted,
    /// The resource is saturated; the process joined the wait queue.
    Queued,
}

/// One waiter decision taken while draining a queue after a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainEvent {
    /// The waiter received a freed instance.
    Granted(NodeId),
    /// Granting the head waiter would have closed a cycle; it was
    /// re-inserted at the back of the queue and the drain stopped.
    Requeued(NodeId),
}

/// Report returned by a successful release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReport {
    /// The earliest-granted holder that gave the resource up.
    pub released: NodeId,
    /// Waiter decisions, in the order they were taken.
    pub events: Vec<DrainEvent>,
}

// ============================================================================
// ALLOCATION ENGINE
// ============================================================================

/// The allocation engine: one owned aggregate, no ambient globals.
#[derive(Debug, Default)]
pub struct AllocationEngine {
    graph: GraphStore,
    resources: HashMap<NodeId, ResourceState>,
    process_count: u64,
    resource_count: u64,
    config: EngineConfig,
    metrics: EngineMetrics,
}

impl AllocationEngine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_parts(config, EngineMetrics::new())
    }

    pub(crate) fn with_parts(config: EngineConfig, metrics: EngineMetrics) -> Self {
        Self {
            graph: GraphStore::new(),
            resources: HashMap::new(),
            process_count: 0,
            resource_count: 0,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared metrics handle.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Read access to the graph, for snapshot projection.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Allocation state of one resource.
    pub fn resource(&self, id: &str) -> Option<&ResourceState> {
        self.resources.get(id)
    }

    // ========================================================================
    // NODE CREATION
    // ========================================================================

    /// Adds a process node and returns its id (`P1`, `P2`, ...).
    pub fn add_process(&mut self) -> NodeId {
        self.process_count += 1;
        let id = format!("P{}", self.process_count);
        self.graph
            .add_node(id.clone(), NodeKind::Process)
            .expect("id counters never reuse an id");
        self.metrics.record_process_added();
        tracing::info!(id = %id, "process added");
        id
    }

    /// Adds a resource node and returns its id (`R1`, `R2`, ...).
    ///
    /// A capacity of zero or below coerces to the configured default.
    pub fn add_resource(&mut self, capacity: i64) -> NodeId {
        self.resource_count += 1;
        let id = format!("R{}", self.resource_count);
        let capacity = if capacity > 0 {
            capacity as usize
        } else {
            self.config.default_capacity
        };
        self.graph
            .add_node(id.clone(), NodeKind::Resource)
            .expect("id counters never reuse an id");
        self.resources
            .insert(id.clone(), ResourceState::with_capacity(capacity));
        self.metrics.record_resource_added();
        tracing::info!(id = %id, capacity, "resource added");
        id
    }

    // ========================================================================
    // REQUEST
    // ========================================================================

    /// A process asks for one instance of a resource.
    ///
    /// The cycle guard always probes the request-direction edge
    /// process→resource, on both branches, including the one that then
    /// commits the opposite-direction allocation edge. The release drain
    /// probes the allocation direction instead.
    pub fn request_resource(
        &mut self,
        process: &str,
        resource: &str,
    ) -> Result<Admission, EngineError> {
        if !self.graph.contains(process) {
            return Err(EngineError::UnknownNode {
                id: process.to_string(),
            });
        }
        if !self.graph.contains(resource) {
            return Err(EngineError::UnknownNode {
                id: resource.to_string(),
            });
        }

        let adjacency = self.graph.rebuild_adjacency();
        if cycle::would_close_cycle(adjacency, process, resource) {
            self.metrics.record_denial();
            tracing::warn!(process, resource, "request denied: cycle");
            return Err(EngineError::DeniedCycle {
                process: process.to_string(),
                resource: resource.to_string(),
            });
        }

        let Some(state) = self.resources.get_mut(resource) else {
            return Err(EngineError::NotAResource {
                id: resource.to_string(),
            });
        };

        let admission = if state.holders.len() < state.capacity {
            self.graph.add_edge(Edge {
                source: resource.to_string(),
                target: process.to_string(),
                kind: EdgeKind::Alloc,
            });
            state.holders.push(process.to_string());
            Admission::Granted
        } else {
            // a process already queued on this resource stays queued once;
            // its waiter entry and Request edge remain in exact correspondence
            if !state.waiters.iter().any(|w| w == process) {
                self.graph.add_edge(Edge {
                    source: process.to_string(),
                    target: resource.to_string(),
                    kind: EdgeKind::Request,
                });
                state.waiters.push_back(process.to_string());
            }
            Admission::Queued
        };
        self.graph.rebuild_adjacency();

        match admission {
            Admission::Granted => {
                self.metrics.record_grant();
                tracing::info!(process, resource, "request granted");
            }
            Admission::Queued => {
                self.metrics.record_queued();
                tracing::info!(process, resource, "request queued: resource saturated");
            }
        }
        Ok(admission)
    }

    // ========================================================================
    // RELEASE
    // ========================================================================

    /// Releases one instance: the earliest-granted holder gives the
    /// resource up, then the wait queue drains head-first while free
    /// capacity remains.
    ///
    /// Each drained waiter is probed with the hypothetical
    /// allocation-direction edge resource→process against the adjacency
    /// that already reflects grants committed earlier in the same drain
    /// (the candidate's own request edge is excluded from the probe,
    /// since the conversion it models replaces that edge). The first
    /// waiter whose grant would close a cycle goes to the back of the
    /// queue and ends the drain: only a contiguous prefix of the queue
    /// can be granted per release.
    pub fn release_resource(&mut self, resource: &str) -> Result<ReleaseReport, EngineError> {
        match self.graph.kind_of(resource) {
            None => {
                return Err(EngineError::UnknownNode {
                    id: resource.to_string(),
                })
            }
            Some(NodeKind::Process) => {
                return Err(EngineError::NotAResource {
                    id: resource.to_string(),
                })
            }
            Some(NodeKind::Resource) => {}
        }
        let Some(state) = self.resources.get_mut(resource) else {
            return Err(EngineError::UnknownNode {
                id: resource.to_string(),
            });
        };

        if state.holders.is_empty() {
            tracing::warn!(resource, "release with no allocated process");
            return Err(EngineError::NothingToRelease {
                id: resource.to_string(),
            });
        }

        let released = state.holders.remove(0);
        self.graph.remove_edge_once(|e| {
            e.kind == EdgeKind::Alloc && e.source == resource && e.target == released
        });
        self.graph.rebuild_adjacency();
        self.metrics.record_release();
        tracing::info!(resource, process = %released, "released by earliest holder");

        let mut events = Vec::new();
        while state.free() > 0 {
            let Some(candidate) = state.waiters.pop_front() else {
                break;
            };
            if cycle::grant_would_close_cycle(self.graph.adjacency(), resource, &candidate) {
                state.waiters.push_back(candidate.clone());
                self.metrics.record_requeue();
                tracing::warn!(
                    resource,
                    process = %candidate,
                    "drain stopped: grant would close a cycle"
                );
                events.push(DrainEvent::Requeued(candidate));
                break;
            }
            self.graph.remove_edge_once(|e| {
                e.kind == EdgeKind::Request && e.source == candidate && e.target == resource
            });
            self.graph.add_edge(Edge {
                source: resource.to_string(),
                target: candidate.clone(),
                kind: EdgeKind::Alloc,
            });
            state.holders.push(candidate.clone());
            self.graph.rebuild_adjacency();
            self.metrics.record_grant();
            tracing::info!(resource, process = %candidate, "granted from queue");
            events.push(DrainEvent::Granted(candidate));
        }

        Ok(ReleaseReport { released, events })
    }

    // ========================================================================
    // RESET
    // ========================================================================

    /// Clears nodes, edges, resource state and both id counters together.
    /// The next creations start over at `P1` / `R1`.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.resources.clear();
        self.process_count = 0;
        self.resource_count = 0;
        self.metrics.record_reset();
        tracing::info!("system reset");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_grant_on_free_resource() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();
        let r1 = engine.add_resource(1);

        let admission = engine.request_resource(&p1, &r1).unwrap();
        assert_eq!(admission, Admission::Granted);
        assert_eq!(engine.resource(&r1).unwrap().holders, [p1]);
        assert!(engine.resource(&r1).unwrap().waiters.is_empty());
    }

    #[test]
    fn saturated_resource_queues_the_request() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();
        let p2 = engine.add_process();
        let r1 = engine.add_resource(1);
        engine.request_resource(&p1, &r1).unwrap();

        let admission = engine.request_resource(&p2, &r1).unwrap();
        assert_eq!(admission, Admission::Queued);
        assert_eq!(engine.resource(&r1).unwrap().waiters, [p2.clone()]);

        // queued again: still queued, no second entry, no second edge
        assert_eq!(engine.request_resource(&p2, &r1).unwrap(), Admission::Queued);
        assert_eq!(engine.resource(&r1).unwrap().waiters, [p2]);
        let request_edges = engine
            .graph()
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::Request)
            .count();
        assert_eq!(request_edges, 1);
    }

    #[test]
    fn self_request_is_denied() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();

        let err = engine.request_resource(&p1, &p1).unwrap_err();
        assert!(matches!(err, EngineError::DeniedCycle { .. }));
        assert!(engine.graph().edges().is_empty());
    }

    #[test]
    fn holder_re_request_is_denied_by_the_guard() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();
        let r1 = engine.add_resource(2);
        engine.request_resource(&p1, &r1).unwrap();

        // R1 -> P1 is committed, so the probe P1 -> R1 closes a 2-cycle
        // even though a free instance remains
        let err = engine.request_resource(&p1, &r1).unwrap_err();
        assert!(matches!(err, EngineError::DeniedCycle { .. }));
        assert_eq!(engine.resource(&r1).unwrap().holders.len(), 1);
    }

    #[test]
    fn capacity_at_or_below_zero_coerces_to_default() {
        let mut engine = AllocationEngine::with_config(EngineConfig::default());
        let r1 = engine.add_resource(0);
        let r2 = engine.add_resource(-4);
        let r3 = engine.add_resource(3);

        assert_eq!(engine.resource(&r1).unwrap().capacity, 1);
        assert_eq!(engine.resource(&r2).unwrap().capacity, 1);
        assert_eq!(engine.resource(&r3).unwrap().capacity, 3);
        assert_eq!(engine.config().default_capacity, 1);
    }

    #[test]
    fn multi_instance_resource_grants_until_saturated() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();
        let p2 = engine.add_process();
        let p3 = engine.add_process();
        let r1 = engine.add_resource(2);

        assert_eq!(engine.request_resource(&p1, &r1).unwrap(), Admission::Granted);
        assert_eq!(engine.request_resource(&p2, &r1).unwrap(), Admission::Granted);
        assert_eq!(engine.request_resource(&p3, &r1).unwrap(), Admission::Queued);

        let state = engine.resource(&r1).unwrap();
        assert_eq!(state.holders, [p1, p2]);
        assert_eq!(state.waiters, [p3]);
        assert!(state.is_saturated());
    }

    #[test]
    fn release_pops_the_earliest_holder_and_grants_the_head_waiter() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();
        let p2 = engine.add_process();
        let r1 = engine.add_resource(1);
        engine.request_resource(&p1, &r1).unwrap();
        engine.request_resource(&p2, &r1).unwrap();

        let report = engine.release_resource(&r1).unwrap();
        assert_eq!(report.released, p1);
        assert_eq!(report.events, [DrainEvent::Granted(p2.clone())]);

        let state = engine.resource(&r1).unwrap();
        assert_eq!(state.holders, [p2]);
        assert!(state.waiters.is_empty());

        let counters = engine.metrics().snapshot();
        assert_eq!(counters.grants, 2);
        assert_eq!(counters.queued, 1);
        assert_eq!(counters.releases, 1);
    }

    #[test]
    fn release_errors_are_recoverable() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();
        let r1 = engine.add_resource(1);

        assert!(matches!(
            engine.release_resource("R9"),
            Err(EngineError::UnknownNode { .. })
        ));
        assert!(matches!(
            engine.release_resource(&p1),
            Err(EngineError::NotAResource { .. })
        ));
        assert!(matches!(
            engine.release_resource(&r1),
            Err(EngineError::NothingToRelease { .. })
        ));

        // the failed calls left the engine usable
        assert_eq!(engine.request_resource(&p1, &r1).unwrap(), Admission::Granted);
    }

    #[test]
    fn unknown_ids_are_rejected_before_any_mutation() {
        let mut engine = AllocationEngine::new();
        let p1 = engine.add_process();

        assert!(matches!(
            engine.request_resource(&p1, "R1"),
            Err(EngineError::UnknownNode { .. })
        ));
        assert!(matches!(
            engine.request_resource("P9", &p1),
            Err(EngineError::UnknownNode { .. })
        ));
        assert!(engine.graph().edges().is_empty());
    }

    #[test]
    fn reset_restarts_the_id_counters() {
        let mut engine = AllocationEngine::new();
        engine.add_process();
        engine.add_process();
        engine.add_resource(2);

        engine.reset();
        assert!(engine.graph().nodes().is_empty());
        assert!(engine.graph().edges().is_empty());
        assert_eq!(engine.add_process(), "P1");
        assert_eq!(engine.add_resource(1), "R1");
    }
}
