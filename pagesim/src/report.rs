//! Simulation results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hits and misses for one trace phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub label: String,
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

impl PhaseReport {
    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }
}

/// Engine counters worth reporting next to hit rates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub victims: u64,
    pub kept_referenced: u64,
    pub promotions: u64,
    pub demotions: u64,
    pub nonresident_hits: u64,
    pub ring_overflows: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimReport {
    pub policy: String,
    pub frames: usize,
    pub phases: Vec<PhaseReport>,
    pub evictions: u64,
    pub daemon_passes: u64,
    pub read_ahead: u64,
    pub engine: EngineCounters,
}

impl SimReport {
    /// Phase with the given label, if the trace had one.
    pub fn phase(&self, label: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.label == label)
    }

    pub fn total_hits(&self) -> u64 {
        self.phases.iter().map(|p| p.hits).sum()
    }

    pub fn total_misses(&self) -> u64 {
        self.phases.iter().map(|p| p.misses).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} frames={:<6} evictions={:<8} daemon={:<6} read-ahead={}",
            self.policy, self.frames, self.evictions, self.daemon_passes, self.read_ahead
        )?;
        writeln!(
            f,
            "  {:<12} {:>10} {:>10} {:>10} {:>8}",
            "phase", "accesses", "hits", "misses", "hit%"
        )?;
        for phase in &self.phases {
            writeln!(
                f,
                "  {:<12} {:>10} {:>10} {:>10} {:>7.2}%",
                phase.label,
                phase.accesses,
                phase.hits,
                phase.misses,
                phase.hit_rate() * 100.0
            )?;
        }
        Ok(())
    }
}
