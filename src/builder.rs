//! Fluent construction for [`AllocationEngine`].

use crate::engine::{AllocationEngine, EngineConfig};
use crate::metrics::EngineMetrics;

/// Builder for `AllocationEngine`.
///
/// Every field has a sensible default, so `build` is infallible.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    metrics: Option<EngineMetrics>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modifies the configuration via a closure.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut EngineConfig),
    {
        f(&mut self.config);
        self
    }

    /// Shares an externally owned metrics handle with the engine.
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> AllocationEngine {
        AllocationEngine::with_parts(self.config, self.metrics.unwrap_or_default())
    }
}
