//! Access traces.
//!
//! A [`Trace`] is a sequence of labelled phases; the simulator reports hits
//! and misses per phase so a warm-up, a disturbance and a recovery can be
//! told apart.
//!
//! ```text
//!   working_set("warm")  .then(sequential("scan"))  .then(working_set("return"))
//!   ┌──────────────────┐ ┌─────────────────────┐   ┌──────────────────┐
//!   │ 0 1 2 .. K 0 1 ..│ │ S S+1 S+2 ... S+M   │   │ 0 1 2 .. K       │
//!   └──────────────────┘ └─────────────────────┘   └──────────────────┘
//! ```

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// One labelled run of accesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub label: String,
    pub keys: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    phases: Vec<Phase>,
}

impl Trace {
    /// Wraps an explicit key sequence.
    pub fn from_keys(label: impl Into<String>, keys: Vec<u64>) -> Self {
        Self {
            phases: vec![Phase {
                label: label.into(),
                keys,
            }],
        }
    }

    /// `len` keys drawn uniformly from `[0, universe)`.
    pub fn uniform(label: impl Into<String>, universe: u64, len: usize, seed: u64) -> Self {
        let universe = universe.max(1);
        let mut rng = SmallRng::seed_from_u64(seed);
        let keys = (0..len).map(|_| rng.random_range(0..universe)).collect();
        Self::from_keys(label, keys)
    }

    /// `start, start + 1, ..` touched once each.
    pub fn sequential(label: impl Into<String>, start: u64, len: usize) -> Self {
        Self::from_keys(label, (start..start + len as u64).collect())
    }

    /// `size` keys starting at `start`, looped `passes` times.
    pub fn working_set(label: impl Into<String>, start: u64, size: usize, passes: usize) -> Self {
        let keys = (0..passes)
            .flat_map(|_| start..start + size as u64)
            .collect();
        Self::from_keys(label, keys)
    }

    /// Appends `next`'s phases after this trace's.
    pub fn then(mut self, next: Trace) -> Self {
        self.phases.extend(next.phases);
        self
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Total accesses across phases.
    pub fn len(&self) -> usize {
        self.phases.iter().map(|p| p.keys.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
