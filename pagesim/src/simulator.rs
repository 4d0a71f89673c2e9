//! Trace-driven fault loop around an [`EvictionEngine`].
//!
//! ```text
//!   access(key)
//!     ├─ resident ─► reference bit + page_activate ─► hit
//!     └─ missing  ─► free frame? ── no ─► page daemon
//!                        │                  flush_all, tune, balance,
//!                        │                  scan_init, select_victim* ,
//!                        │                  scan_fini
//!                        ▼
//!                    map + page_activate (+ read-ahead page_enqueue) ─► miss
//! ```
//!
//! Single-threaded: every intent goes through the calling thread's ring and
//! the daemon flushes all rings before it scans.

use std::sync::Arc;

use pagekit::builder::EngineBuilder;
use pagekit::config::{PolicyConfig, PolicyKind};
use pagekit::engine::EvictionEngine;
use pagekit::page::{PageClass, PageId};
use pagekit::traits::PageOwner;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::SimError;
use crate::report::{EngineCounters, PhaseReport, SimReport};
use crate::trace::Trace;
use crate::universe::Universe;

/// Daemon passes tried before a fault gives up on finding a frame.
const MAX_DAEMON_PASSES: usize = 4;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub policy: PolicyConfig,
    pub frames: usize,
    /// Frames the daemon keeps free; it runs once the free count drops to it.
    pub free_target: usize,
    /// Frames reclaimed beyond `free_target` per daemon pass.
    pub reclaim_batch: usize,
    /// Following keys brought in speculatively on every miss.
    pub read_ahead: usize,
    pub class: PageClass,
}

impl SimConfig {
    pub fn new(kind: PolicyKind, frames: usize) -> Self {
        Self {
            policy: PolicyConfig::for_kind(kind),
            frames,
            free_target: (frames / 64).max(1),
            reclaim_batch: 16,
            read_ahead: 0,
            class: PageClass::File,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    evictions: u64,
    daemon_passes: u64,
    read_ahead: u64,
    accesses: u64,
}

pub struct Simulator {
    config: SimConfig,
    universe: Arc<Universe>,
    engine: EvictionEngine<Arc<Universe>>,
    resident: FxHashMap<u64, PageId>,
    counters: Counters,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let universe = Arc::new(Universe::new(
            config.frames,
            config.free_target,
            config.class,
        ));
        let engine = EngineBuilder::from_config(config.policy.clone(), config.frames)
            .try_build(Arc::clone(&universe))?;
        debug!(
            kind = %config.policy.kind,
            frames = config.frames,
            free_target = config.free_target,
            read_ahead = config.read_ahead,
            "simulator ready"
        );
        Ok(Self {
            config,
            universe,
            engine,
            resident: FxHashMap::default(),
            counters: Counters::default(),
        })
    }

    pub fn engine(&self) -> &EvictionEngine<Arc<Universe>> {
        &self.engine
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn is_resident(&self, key: u64) -> bool {
        self.resident.contains_key(&key)
    }

    pub fn resident_pages(&self) -> usize {
        self.resident.len()
    }

    /// Touches `key`; `Ok(true)` on a hit.
    pub fn access(&mut self, key: u64) -> Result<bool, SimError> {
        self.counters.accesses += 1;
        if let Some(&page) = self.resident.get(&key) {
            self.universe.reference(page);
            self.engine.page_activate(page);
            self.engine.page_realize(page);
            return Ok(true);
        }

        let page = self.fault_in(key, true)?;
        self.engine.page_activate(page);
        self.engine.page_realize(page);

        for ahead in 1..=self.config.read_ahead as u64 {
            let next = key.wrapping_add(ahead);
            if self.resident.contains_key(&next) {
                continue;
            }
            let page = self.fault_in(next, false)?;
            self.engine.page_enqueue(page);
            self.engine.page_realize(page);
            self.counters.read_ahead += 1;
        }
        Ok(false)
    }

    /// Replays `trace` and reports per-phase results.
    pub fn run(&mut self, trace: &Trace) -> Result<SimReport, SimError> {
        let mut phases = Vec::with_capacity(trace.phases().len());
        for phase in trace.phases() {
            let mut report = PhaseReport {
                label: phase.label.clone(),
                ..PhaseReport::default()
            };
            for &key in &phase.keys {
                report.accesses += 1;
                if self.access(key)? {
                    report.hits += 1;
                } else {
                    report.misses += 1;
                }
            }
            debug!(
                phase = %report.label,
                hits = report.hits,
                misses = report.misses,
                "phase complete"
            );
            phases.push(report);
        }
        self.engine.flush_all();
        Ok(self.report(phases))
    }

    /// Runs one page-daemon pass: reclaims until `free_target +
    /// reclaim_batch` frames are free or the hand finds nothing more.
    pub fn page_daemon(&mut self) {
        self.counters.daemon_passes += 1;
        self.engine.flush_all();
        self.engine.tune();
        if self.engine.needs_scan() {
            self.engine.balance_queue(0);
        }

        let goal = self.config.free_target + self.config.reclaim_batch;
        let mut reclaimed = 0u64;
        self.engine.scan_init();
        while self.universe.free_pages() < goal {
            let Some((page, token)) = self.engine.select_victim() else {
                break;
            };
            let key = self.universe.unmap(page);
            drop(token);
            if let Some(key) = key {
                self.resident.remove(&key);
                trace!(key, %page, "evicted");
            }
            self.engine.page_dequeue(page);
            self.engine.realize_now(page);
            self.universe.release(page);
            reclaimed += 1;
        }
        self.engine.scan_fini();
        self.counters.evictions += reclaimed;
        debug!(
            reclaimed,
            free = self.universe.free_pages(),
            queued = self.engine.queued_pages(),
            "page daemon pass"
        );
    }

    fn fault_in(&mut self, key: u64, referenced: bool) -> Result<PageId, SimError> {
        let mut passes = 0;
        while self.universe.free_pages() <= self.config.free_target {
            if passes > 0 && self.universe.free_pages() > 0 {
                break;
            }
            if passes == MAX_DAEMON_PASSES {
                return Err(SimError::NoVictim {
                    accesses: self.counters.accesses,
                });
            }
            self.page_daemon();
            passes += 1;
        }
        let page = self.universe.allocate().ok_or(SimError::NoVictim {
            accesses: self.counters.accesses,
        })?;
        self.universe.map(page, key, referenced);
        self.resident.insert(key, page);
        Ok(page)
    }

    fn report(&self, phases: Vec<PhaseReport>) -> SimReport {
        SimReport {
            policy: self.config.policy.kind.to_string(),
            frames: self.config.frames,
            phases,
            evictions: self.counters.evictions,
            daemon_passes: self.counters.daemon_passes,
            read_ahead: self.counters.read_ahead,
            engine: self.engine_counters(),
        }
    }

    fn engine_counters(&self) -> EngineCounters {
        let m = self.engine.metrics();
        EngineCounters {
            victims: m.victims,
            kept_referenced: m.kept_referenced,
            promotions: m.cold_to_hot_promotions,
            demotions: m.hot_to_cold_demotions,
            nonresident_hits: m.nonresident_hits,
            ring_overflows: m.ring_overflows,
        }
    }
}
