/// Point-in-time copy of the engine's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PolicyMetricsSnapshot {
    // realizer
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

    // scanner
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

    // CLOCK-Pro
    pub cold_to_hot_promotions: u64,
    pub hot_to_cold_demotions: u64,
    pub test_starts: u64,
    pub test_expired: u64,
    pub nonresident_hits: u64,
    pub nonresident_records: u64,
    pub takeovers: u64,

    // gauges captured at snapshot time
    pub queued_pages: usize,
    pub target: usize,
    pub pending: usize,
}

impl PolicyMetricsSnapshot {
    /// Intents that changed some queue.
    pub fn realized_total(&self) -> u64 {
        self.realized_inserts
            + self.realized_activations
            + self.realized_deactivations
            + self.realized_removals
    }
}
