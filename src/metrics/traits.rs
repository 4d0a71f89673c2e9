//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and export are split into small traits so the
//! realizer and scanners only ever *write* counters, while tests, benches and
//! monitoring only ever *read* them.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │   RealizerMetricsRecorder    │
//!                 │  realized / flush / overflow │
//!                 └──────────────┬───────────────┘
//!                                │
//!                 ┌──────────────┴───────────────┐
//!                 │     ScanMetricsRecorder      │
//!                 │ candidate / victim / keep    │
//!                 └──────────────┬───────────────┘
//!                                │
//!                 ┌──────────────┴───────────────┐
//!                 │   ClockProMetricsRecorder    │
//!                 │ promote / demote / history   │
//!                 └──────────────────────────────┘
//!
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! All recorders take `&mut self`: counters live inside the policy core and
//! are only touched with the global lock held.

use crate::page::Realization;

/// Counters for intent realization and the per-CPU rings.
pub trait RealizerMetricsRecorder {
    fn record_realization(&mut self, realization: Realization);
    fn record_ring_flush(&mut self, drained: usize);
    fn record_ring_overflow(&mut self);
    fn record_direct_realization(&mut self);
    fn record_trickle_pass(&mut self, drained: usize);
}

/// Counters for the victim scanner and the balance pass.
pub trait ScanMetricsRecorder: RealizerMetricsRecorder {
    fn record_select_call(&mut self);
    fn record_candidate(&mut self);
    fn record_owner_busy(&mut self, skipped: u64);
    fn record_stale_candidate(&mut self);
    fn record_kept_referenced(&mut self);
    fn record_kept_protected(&mut self);
    fn record_victim(&mut self);
    fn record_budget_exhausted(&mut self);
    fn record_balance_deactivation(&mut self);
    fn record_swap_dropped(&mut self);
}

/// CLOCK-Pro specific signals.
pub trait ClockProMetricsRecorder: ScanMetricsRecorder {
    fn record_cold_to_hot_promotion(&mut self);
    fn record_hot_to_cold_demotion(&mut self);
    fn record_test_start(&mut self);
    fn record_test_expired(&mut self, n: u64);
    fn record_nonresident_hit(&mut self);
    fn record_nonresident_record(&mut self);
    fn record_takeover(&mut self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
