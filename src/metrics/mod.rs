//! Engine counters (feature `metrics`).
//!
//! Counters are plain `u64`s inside the policy core and only change under the
//! global lock. [`EvictionEngine::metrics`](crate::engine::EvictionEngine::metrics)
//! copies them out as a [`PolicyMetricsSnapshot`].

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use metrics_impl::EngineMetrics;
pub use snapshot::PolicyMetricsSnapshot;
