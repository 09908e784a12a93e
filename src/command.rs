//! Command Seam
//!
//! The boundary presentation collaborators talk through: validated
//! commands in, outcomes out. Errors fold into an outcome variant so a
//! command loop can render every result uniformly instead of unwinding.

use crate::engine::{Admission, AllocationEngine, EngineError, ReleaseReport};
use crate::graph::NodeId;
use serde::{Deserialize, Serialize};

/// An operator command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Create the next process node.
    AddProcess,
    /// Create the next resource node; capacity coerces to the default
    /// when zero or below.
    AddResource { capacity: i64 },
    /// One process asks for one instance of one resource.
    Request { process: NodeId, resource: NodeId },
    /// The earliest-granted holder gives the resource up.
    Release { resource: NodeId },
    /// Destroy all nodes, edges and per-resource state.
    Reset,
}

/// Result of applying a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    ProcessAdded(NodeId),
    ResourceAdded(NodeId),
    Granted,
    Queued,
    Released(ReleaseReport),
    ResetDone,
    Rejected(EngineError),
}

/// Anything that consumes commands and produces outcomes.
///
/// `apply` must be deterministic: the same command applied to the same
/// state always produces the same outcome.
pub trait CommandSink {
    /// The command type that modifies state.
    type Command;
    /// The result of applying a command.
    type Outcome;

    fn apply(&mut self, command: Self::Command) -> Self::Outcome;
}

impl CommandSink for AllocationEngine {
    type Command = Command;
    type Outcome = CommandOutcome;

    fn apply(&mut self, command: Command) -> CommandOutcome {
        match command {
            Command::AddProcess => CommandOutcome::ProcessAdded(self.add_process()),
            Command::AddResource { capacity } => {
                CommandOutcome::ResourceAdded(self.add_resource(capacity))
            }
            Command::Request { process, resource } => {
                match self.request_resource(&process, &resource) {
                    Ok(Admission::Granted) => CommandOutcome::Granted,
                    Ok(Admission::Queued) => CommandOutcome::Queued,
                    Err(e) => CommandOutcome::Rejected(e),
                }
            }
            Command::Release { resource } => match self.release_resource(&resource) {
                Ok(report) => CommandOutcome::Released(report),
                Err(e) => CommandOutcome::Rejected(e),
            },
            Command::Reset => {
                self.reset();
                CommandOutcome::ResetDone
            }
        }
    }
}
