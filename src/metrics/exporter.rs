use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::PolicyMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for engine snapshots.
///
/// Writes the Prometheus text exposition format so output can be scraped
/// directly or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        };
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {name} {kind}");
        let _ = writeln!(writer, "{name} {value}");
    }

    fn counter(&self, suffix: &str, value: u64) {
        self.write_metric("counter", suffix, value);
    }

    fn gauge(&self, suffix: &str, value: usize) {
        self.write_metric("gauge", suffix, value as u64);
    }
}

impl<W: Write + Send> MetricsExporter<PolicyMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, s: &PolicyMetricsSnapshot) {
        self.counter("realized_inserts_total", s.realized_inserts);
        self.counter("realized_activations_total", s.realized_activations);
        self.counter("realized_deactivations_total", s.realized_deactivations);
        self.counter("realized_removals_total", s.realized_removals);
        self.counter("realized_ignored_total", s.realized_ignored);
        self.counter("ring_flushes_total", s.ring_flushes);
        self.counter("ring_flushed_pages_total", s.ring_flushed_pages);
        self.counter("ring_overflows_total", s.ring_overflows);
        self.counter("direct_realizations_total", s.direct_realizations);
        self.counter("trickle_passes_total", s.trickle_passes);
        self.counter("trickled_pages_total", s.trickled_pages);

        self.counter("select_calls_total", s.select_calls);
        self.counter("candidates_total", s.candidates);
        self.counter("owner_busy_total", s.owner_busy);
        self.counter("stale_candidates_total", s.stale_candidates);
        self.counter("kept_referenced_total", s.kept_referenced);
        self.counter("kept_protected_total", s.kept_protected);
        self.counter("victims_total", s.victims);
        self.counter("budget_exhausted_total", s.budget_exhausted);
        self.counter("balance_deactivations_total", s.balance_deactivations);
        self.counter("swap_dropped_total", s.swap_dropped);

        self.counter("cold_to_hot_promotions_total", s.cold_to_hot_promotions);
        self.counter("hot_to_cold_demotions_total", s.hot_to_cold_demotions);
        self.counter("test_starts_total", s.test_starts);
        self.counter("test_expired_total", s.test_expired);
        self.counter("nonresident_hits_total", s.nonresident_hits);
        self.counter("nonresident_records_total", s.nonresident_records);
        self.counter("takeovers_total", s.takeovers);

        self.gauge("queued_pages", s.queued_pages);
        self.gauge("target_pages", s.target);
        self.gauge("pending_pages", s.pending);
    }
}
