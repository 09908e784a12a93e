//! Admission Metrics and Observability
//!
//! Counters for admission traffic. Observability only: nothing here
//! carries an invariant, and relaxed ordering is enough.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared admission counters.
///
/// Cheap to clone; every clone updates the same interior, so a handle
/// can be given to an observer while the engine keeps its own.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    processes_added: AtomicU64,
    resources_added: AtomicU64,
    grants: AtomicU64,
    queued: AtomicU64,
    denials: AtomicU64,
    releases: AtomicU64,
    requeues: AtomicU64,
    resets: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // RECORDERS
    // ========================================================================

    pub fn record_process_added(&self) {
        self.inner.processes_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resource_added(&self) {
        self.inner.resources_added.fetch_add(1, Ordering::Relaxed);
    }

    /// An immediate grant or a successful queue drain.
    pub fn record_grant(&self) {
        self.inner.grants.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.inner.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// A request refused by the cycle guard.
    pub fn record_denial(&self) {
        self.inner.denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.inner.releases.fetch_add(1, Ordering::Relaxed);
    }

    /// A head waiter sent to the back of its queue by a blocked drain.
    pub fn record_requeue(&self) {
        self.inner.requeues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.inner.resets.fetch_add(1, Ordering::Relaxed);
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Point-in-time export of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processes_added: self.inner.processes_added.load(Ordering::Relaxed),
            resources_added: self.inner.resources_added.load(Ordering::Relaxed),
            grants: self.inner.grants.load(Ordering::Relaxed),
            queued: self.inner.queued.load(Ordering::Relaxed),
            denials: self.inner.denials.load(Ordering::Relaxed),
            releases: self.inner.releases.load(Ordering::Relaxed),
            requeues: self.inner.requeues.load(Ordering::Relaxed),
            resets: self.inner.resets.load(Ordering::Relaxed),
        }
    }
}

/// Counter values as of one [`EngineMetrics::snapshot`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub processes_added: u64,
    pub resources_added: u64,
    pub grants: u64,
    pub queued: u64,
    pub denials: u64,
    pub releases: u64,
    pub requeues: u64,
    pub resets: u64,
}
