//! Adaptive per-class targets.
//!
//! The tuner turns the configured percentages into page counts for the
//! current pool size, and once per scan cycle decides which consumer classes
//! the scanner should leave alone.
//!
//! ```text
//!   recompute(queued, free, free_target)        plan_cycle(class counts)
//!   ────────────────────────────────────        ─────────────────────────
//!   floor[c]   = min_pct[c] * (queued+free)/100   under[c] = count <= floor[c]
//!   ceiling[c] = max_pct[c] * (queued+free)/100   over[c]  = count >  ceiling[c]
//!   target     = max(pct * queued / 100,          protected[c] = under[c]
//!                    free_target + 1, 1)              || (!over[c] && any other over)
//! ```
//!
//! A cycle in which every class would be protected protects none, so the
//! scanner can always find a victim.

use tracing::debug;

use crate::config::{ClassLimits, PolicyConfig, PolicyKind};
use crate::page::PageClass;

#[derive(Debug, Clone)]
pub struct Tuner {
    limits: [ClassLimits; 3],
    target_pct: u32,
    floors: [usize; 3],
    ceilings: [usize; 3],
    queued: usize,
    floor: usize,
    target: usize,
    protected: [bool; 3],
}

impl Tuner {
    pub fn new(config: &PolicyConfig) -> Self {
        let target_pct = match config.kind {
            PolicyKind::Clock => config.inactive_pct,
            PolicyKind::ClockPro => config.cold_target_pct,
        };
        Self {
            limits: config.class_limits,
            target_pct,
            floors: [0; 3],
            ceilings: [0; 3],
            queued: 0,
            floor: 1,
            target: 1,
            protected: [false; 3],
        }
    }

    /// Recomputes class bounds and the overall target.
    pub fn recompute(&mut self, queued: usize, free: usize, free_target: usize) {
        let pool = queued + free;
        for class in PageClass::ALL {
            let limits = self.limits[class.index()];
            self.floors[class.index()] = pct_of(limits.min_pct, pool);
            self.ceilings[class.index()] = pct_of(limits.max_pct, pool);
        }
        self.queued = queued;
        self.floor = free_target.saturating_add(1).max(1);
        self.target = pct_of(self.target_pct, queued).max(self.floor);
        debug!(
            queued,
            free,
            free_target,
            target = self.target,
            floor = self.floor,
            "tuner recomputed"
        );
    }

    /// Decides the protected classes for the coming scan cycle.
    pub fn plan_cycle(&mut self, counts: [usize; 3]) {
        let under: [bool; 3] = std::array::from_fn(|i| counts[i] <= self.floors[i]);
        let over: [bool; 3] = std::array::from_fn(|i| counts[i] > self.ceilings[i]);
        let mut protected: [bool; 3] = std::array::from_fn(|i| {
            let other_over = (0..3).any(|j| j != i && over[j]);
            under[i] || (!over[i] && other_over)
        });
        if protected.iter().all(|&p| p) {
            protected = [false; 3];
        }
        if protected != self.protected {
            debug!(?counts, ?protected, "class protection changed");
        }
        self.protected = protected;
    }

    /// Whether the scanner should keep pages of `class` this cycle.
    #[inline]
    pub fn is_protected(&self, class: PageClass) -> bool {
        self.protected[class.index()]
    }

    /// Overall inactive (CLOCK) or base cold (CLOCK-Pro) target.
    #[inline]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Lowest value any target may take: `max(1, free_target + 1)`.
    #[inline]
    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Clamps a raw target to `[floor, max(floor, queued * max_pct / 100)]`.
    pub fn clamp_target(&self, raw: i64, max_pct: u32) -> usize {
        let hi = pct_of(max_pct, self.queued).max(self.floor);
        raw.clamp(self.floor as i64, hi as i64) as usize
    }

    pub fn class_floor(&self, class: PageClass) -> usize {
        self.floors[class.index()]
    }

    pub fn class_ceiling(&self, class: PageClass) -> usize {
        self.ceilings[class.index()]
    }
}

#[inline]
fn pct_of(pct: u32, n: usize) -> usize {
    (n as u128 * pct as u128 / 100) as usize
}
