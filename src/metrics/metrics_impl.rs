use crate::metrics::snapshot::PolicyMetricsSnapshot;
use crate::metrics::traits::{
    ClockProMetricsRecorder, RealizerMetricsRecorder, ScanMetricsRecorder,
};
use crate::page::Realization;

/// Counters kept inside the policy core, under the global lock.
#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    pub realized_inserts: u64,
    pub realized_activations: u64,
    pub realized_deactivations: u64,
    pub realized_removals: u64,
    pub realized_ignored: u64,
    pub ring_flushes: u64,
    pub ring_flushed_pages: u64,
    pub ring_overflows: u64,
    pub direct_realizations: u64,
    pub trickle_passes: u64,
    pub trickled_pages: u64,

    pub select_calls: u64,
    pub candidates: u64,
    pub owner_busy: u64,
    pub stale_candidates: u64,
    pub kept_referenced: u64,
    pub kept_protected: u64,
    pub victims: u64,
    pub budget_exhausted: u64,
    pub balance_deactivations: u64,
    pub swap_dropped: u64,

    pub cold_to_hot_promotions: u64,
    pub hot_to_cold_demotions: u64,
    pub test_starts: u64,
    pub test_expired: u64,
    pub nonresident_hits: u64,
    pub nonresident_records: u64,
    pub takeovers: u64,
}

impl EngineMetrics {
    /// Copies the counters; gauges are left for the caller to fill in.
    pub fn to_snapshot(&self) -> PolicyMetricsSnapshot {
        PolicyMetricsSnapshot {
            realized_inserts: self.realized_inserts,
            realized_activations: self.realized_activations,
            realized_deactivations: self.realized_deactivations,
            realized_removals: self.realized_removals,
            realized_ignored: self.realized_ignored,
            ring_flushes: self.ring_flushes,
            ring_flushed_pages: self.ring_flushed_pages,
            ring_overflows: self.ring_overflows,
            direct_realizations: self.direct_realizations,
            trickle_passes: self.trickle_passes,
            trickled_pages: self.trickled_pages,
            select_calls: self.select_calls,
            candidates: self.candidates,
            owner_busy: self.owner_busy,
            stale_candidates: self.stale_candidates,
            kept_referenced: self.kept_referenced,
            kept_protected: self.kept_protected,
            victims: self.victims,
            budget_exhausted: self.budget_exhausted,
            balance_deactivations: self.balance_deactivations,
            swap_dropped: self.swap_dropped,
            cold_to_hot_promotions: self.cold_to_hot_promotions,
            hot_to_cold_demotions: self.hot_to_cold_demotions,
            test_starts: self.test_starts,
            test_expired: self.test_expired,
            nonresident_hits: self.nonresident_hits,
            nonresident_records: self.nonresident_records,
            takeovers: self.takeovers,
            ..PolicyMetricsSnapshot::default()
        }
    }
}

impl RealizerMetricsRecorder for EngineMetrics {
    fn record_realization(&mut self, realization: Realization) {
        match realization {
            Realization::Ignore => self.realized_ignored += 1,
            Realization::Insert(_) => self.realized_inserts += 1,
            Realization::Activate => self.realized_activations += 1,
            Realization::Deactivate => self.realized_deactivations += 1,
            Realization::Remove => self.realized_removals += 1,
        }
    }
    fn record_ring_flush(&mut self, drained: usize) {
        self.ring_flushes += 1;
        self.ring_flushed_pages += drained as u64;
    }
    fn record_ring_overflow(&mut self) {
        self.ring_overflows += 1;
    }
    fn record_direct_realization(&mut self) {
        self.direct_realizations += 1;
    }
    fn record_trickle_pass(&mut self, drained: usize) {
        self.trickle_passes += 1;
        self.trickled_pages += drained as u64;
    }
}

impl ScanMetricsRecorder for EngineMetrics {
    fn record_select_call(&mut self) {
        self.select_calls += 1;
    }
    fn record_candidate(&mut self) {
        self.candidates += 1;
    }
    fn record_owner_busy(&mut self, skipped: u64) {
        self.owner_busy += skipped;
    }
    fn record_stale_candidate(&mut self) {
        self.stale_candidates += 1;
    }
    fn record_kept_referenced(&mut self) {
        self.kept_referenced += 1;
    }
    fn record_kept_protected(&mut self) {
        self.kept_protected += 1;
    }
    fn record_victim(&mut self) {
        self.victims += 1;
    }
    fn record_budget_exhausted(&mut self) {
        self.budget_exhausted += 1;
    }
    fn record_balance_deactivation(&mut self) {
        self.balance_deactivations += 1;
    }
    fn record_swap_dropped(&mut self) {
        self.swap_dropped += 1;
    }
}

impl ClockProMetricsRecorder for EngineMetrics {
    fn record_cold_to_hot_promotion(&mut self) {
        self.cold_to_hot_promotions += 1;
    }
    fn record_hot_to_cold_demotion(&mut self) {
        self.hot_to_cold_demotions += 1;
    }
    fn record_test_start(&mut self) {
        self.test_starts += 1;
    }
    fn record_test_expired(&mut self, n: u64) {
        self.test_expired += n;
    }
    fn record_nonresident_hit(&mut self) {
        self.nonresident_hits += 1;
    }
    fn record_nonresident_record(&mut self) {
        self.nonresident_records += 1;
    }
    fn record_takeover(&mut self) {
        self.takeovers += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Admission;

    #[test]
    fn realizations_land_in_their_counters() {
        let mut m = EngineMetrics::default();
        m.record_realization(Realization::Insert(Admission::Speculative));
        m.record_realization(Realization::Insert(Admission::Referenced));
        m.record_realization(Realization::Remove);
        m.record_realization(Realization::Ignore);
        let snap = m.to_snapshot();
        assert_eq!(snap.realized_inserts, 2);
        assert_eq!(snap.realized_removals, 1);
        assert_eq!(snap.realized_ignored, 1);
        assert_eq!(snap.realized_total(), 3);
    }

    #[test]
    fn flush_counts_pages() {
        let mut m = EngineMetrics::default();
        m.record_ring_flush(5);
        m.record_ring_flush(0);
        assert_eq!(m.ring_flushes, 2);
        assert_eq!(m.ring_flushed_pages, 5);
    }
}
