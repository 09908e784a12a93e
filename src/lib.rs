//! Deadlock-avoidance admission over a resource-allocation graph.
//!
//! Processes and resources are nodes in one directed graph. An `Alloc`
//! edge points resource→process (the resource is held); a `Request` edge
//! points process→resource (the process is waiting). A grant that would
//! close a cycle in the graph is refused outright on the request path and
//! deferred on the release-drain path.
//!
//! Cycle-freedom is an avoidance policy, not a detection algorithm: for
//! resources with capacity above one it is conservative, so a refused
//! grant is not proof that a deadlock was imminent.

pub mod builder;
pub mod command;
pub mod cycle;
pub mod engine;
pub mod graph;
pub mod metrics;
pub mod snapshot;

pub use builder::EngineBuilder;
pub use command::{Command, CommandOutcome, CommandSink};
pub use engine::{Admission, AllocationEngine, DrainEvent, EngineConfig, EngineError, ReleaseReport};
pub use graph::{Edge, EdgeKind, GraphStore, Node, NodeId, NodeKind};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use snapshot::{EngineSnapshot, LayoutConfig, SnapshotBuilder};
