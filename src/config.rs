//! Engine configuration.
//!
//! [`PolicyConfig`] is a plain struct with sensible defaults; build one with
//! struct-update syntax or through [`EngineBuilder`](crate::builder::EngineBuilder)
//! and it is validated once, at `init`.
//!
//! ## Defaults
//!
//! | Field                  | Default          |
//! |------------------------|------------------|
//! | `kind`                 | `ClockPro`       |
//! | `ncpu`                 | available parallelism |
//! | `ring_capacity`        | 64               |
//! | `trickle_interval`     | 125 ms           |
//! | `trickle_batch`        | 8                |
//! | anon / file / exec     | 10–80 / 10–50 / 5–30 % |
//! | `inactive_pct`         | 33               |
//! | `cold_target_pct`      | 10               |
//! | `cold_target_max_pct`  | 50               |
//! | `adaptive_cold_target` | `true`           |
//! | `new_queue_min`        | 8                |
//! | `nonresident_pct`      | 100              |

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::page::PageClass;

/// Replacement algorithm driving the queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Two-queue CLOCK (active/inactive).
    Clock,
    /// CLOCK-Pro (new/cold/hot) with non-resident history.
    ClockPro,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::Clock => "clock",
            PolicyKind::ClockPro => "clockpro",
        })
    }
}

/// Minimum and maximum share of pageable memory for one class, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLimits {
    pub min_pct: u32,
    pub max_pct: u32,
}

impl ClassLimits {
    pub const fn new(min_pct: u32, max_pct: u32) -> Self {
        Self { min_pct, max_pct }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub kind: PolicyKind,
    /// Number of per-CPU rings.
    pub ncpu: usize,
    /// Pages each ring holds before it is flushed.
    pub ring_capacity: usize,
    /// Minimum spacing between idle trickle passes on one CPU.
    pub trickle_interval: Duration,
    /// Entries drained per trickle pass.
    pub trickle_batch: usize,
    /// Limits indexed by [`PageClass::index`].
    pub class_limits: [ClassLimits; 3],
    /// CLOCK inactive target, percent of queued pages.
    pub inactive_pct: u32,
    /// CLOCK-Pro base cold target, percent of queued pages.
    pub cold_target_pct: u32,
    /// Ceiling for the adaptive cold target, percent of queued pages.
    pub cold_target_max_pct: u32,
    /// Apply test-period feedback to the cold target.
    pub adaptive_cold_target: bool,
    /// Lower bound on the new-queue length before rotation.
    pub new_queue_min: usize,
    /// Non-resident history size, percent of total pages.
    pub nonresident_pct: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::ClockPro,
            ncpu: std::thread::available_parallelism().map_or(1, |n| n.get()),
            ring_capacity: 64,
            trickle_interval: Duration::from_millis(125),
            trickle_batch: 8,
            class_limits: [
                ClassLimits::new(10, 80),
                ClassLimits::new(10, 50),
                ClassLimits::new(5, 30),
            ],
            inactive_pct: 33,
            cold_target_pct: 10,
            cold_target_max_pct: 50,
            adaptive_cold_target: true,
            new_queue_min: 8,
            nonresident_pct: 100,
        }
    }
}

impl PolicyConfig {
    /// Default configuration for `kind`.
    pub fn for_kind(kind: PolicyKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Limits for `class`.
    #[inline]
    pub fn limits(&self, class: PageClass) -> ClassLimits {
        self.class_limits[class.index()]
    }

    /// Checks every field; the first problem found is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ncpu == 0 {
            return Err(ConfigError::new("ncpu must be > 0"));
        }
        if self.ring_capacity == 0 {
            return Err(ConfigError::new("ring_capacity must be > 0"));
        }
        if self.trickle_batch == 0 {
            return Err(ConfigError::new("trickle_batch must be > 0"));
        }
        for class in PageClass::ALL {
            let ClassLimits { min_pct, max_pct } = self.limits(class);
            if max_pct > 100 {
                return Err(ConfigError::new(format!(
                    "{class:?} max_pct must be <= 100, got {max_pct}"
                )));
            }
            if min_pct > max_pct {
                return Err(ConfigError::new(format!(
                    "{class:?} min_pct ({min_pct}) must be <= max_pct ({max_pct})"
                )));
            }
        }
        let min_sum: u32 = self.class_limits.iter().map(|l| l.min_pct).sum();
        if min_sum > 95 {
            return Err(ConfigError::new(format!(
                "sum of class min_pct must be <= 95, got {min_sum}"
            )));
        }
        for (name, pct) in [
            ("inactive_pct", self.inactive_pct),
            ("cold_target_pct", self.cold_target_pct),
            ("cold_target_max_pct", self.cold_target_max_pct),
        ] {
            if pct > 100 {
                return Err(ConfigError::new(format!("{name} must be <= 100, got {pct}")));
            }
        }
        if self.cold_target_pct > self.cold_target_max_pct {
            return Err(ConfigError::new(format!(
                "cold_target_pct ({}) must be <= cold_target_max_pct ({})",
                self.cold_target_pct, self.cold_target_max_pct
            )));
        }
        if self.nonresident_pct > 1000 {
            return Err(ConfigError::new(format!(
                "nonresident_pct must be <= 1000, got {}",
                self.nonresident_pct
            )));
        }
        Ok(())
    }
}
