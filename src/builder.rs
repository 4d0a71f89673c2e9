//! Fluent construction of an [`EvictionEngine`].
//!
//! Starts from [`PolicyConfig::for_kind`] and lets callers override only the
//! knobs they care about. Validation happens once, in [`EngineBuilder::try_build`].
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use pagekit::builder::EngineBuilder;
//! use pagekit::config::PolicyKind;
//! # use pagekit::page::{PageId, PageIdentity, ObjectId, PageClass};
//! # use pagekit::traits::PageOwner;
//! # struct Pool;
//! # impl PageOwner for Pool {
//! #     type Token = ();
//! #     fn try_lock_owner(&self, _: PageId) -> Option<()> { Some(()) }
//! #     fn test_and_clear_reference(&self, _: PageId) -> bool { false }
//! #     fn try_drop_swap(&self, _: PageId) -> bool { false }
//! #     fn identity(&self, p: PageId) -> PageIdentity {
//! #         PageIdentity::new(ObjectId(0), p.index() as u64, PageClass::File)
//! #     }
//! #     fn free_pages(&self) -> usize { 0 }
//! #     fn free_target(&self) -> usize { 0 }
//! # }
//!
//! let engine = EngineBuilder::new(PolicyKind::ClockPro, 1024)
//!     .ncpu(4)
//!     .ring_capacity(32)
//!     .trickle_interval(Duration::from_millis(50))
//!     .build(Pool);
//!
//! let page = PageId::new(7);
//! engine.page_activate(page);
//! engine.page_realize(page);
//! engine.flush_all();
//! assert_eq!(engine.queued_pages(), 1);
//! ```

use std::time::Duration;

use crate::config::{ClassLimits, PolicyConfig, PolicyKind};
use crate::engine::EvictionEngine;
use crate::error::ConfigError;
use crate::page::PageClass;
use crate::traits::PageOwner;

/// Builder for [`EvictionEngine`] instances.
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    config: PolicyConfig,
    total_pages: usize,
}

impl EngineBuilder {
    /// Create a builder for `total_pages` pages under the given policy.
    pub fn new(kind: PolicyKind, total_pages: usize) -> Self {
        Self {
            config: PolicyConfig::for_kind(kind),
            total_pages,
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: PolicyConfig, total_pages: usize) -> Self {
        Self {
            config,
            total_pages,
        }
    }

    pub fn ncpu(mut self, ncpu: usize) -> Self {
        self.config.ncpu = ncpu;
        self
    }

    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.config.ring_capacity = capacity;
        self
    }

    pub fn trickle_interval(mut self, interval: Duration) -> Self {
        self.config.trickle_interval = interval;
        self
    }

    pub fn trickle_batch(mut self, batch: usize) -> Self {
        self.config.trickle_batch = batch;
        self
    }

    /// Per-class minimum and maximum share of the pool, in percent.
    pub fn class_limits(mut self, class: PageClass, min_pct: u32, max_pct: u32) -> Self {
        self.config.class_limits[class.index()] = ClassLimits::new(min_pct, max_pct);
        self
    }

    pub fn inactive_pct(mut self, pct: u32) -> Self {
        self.config.inactive_pct = pct;
        self
    }

    pub fn cold_target_pct(mut self, pct: u32) -> Self {
        self.config.cold_target_pct = pct;
        self
    }

    pub fn cold_target_max_pct(mut self, pct: u32) -> Self {
        self.config.cold_target_max_pct = pct;
        self
    }

    /// Enable or disable history-driven cold-target adaptation.
    pub fn adaptive_cold_target(mut self, enabled: bool) -> Self {
        self.config.adaptive_cold_target = enabled;
        self
    }

    pub fn new_queue_min(mut self, pages: usize) -> Self {
        self.config.new_queue_min = pages;
        self
    }

    /// Non-resident history size as a percentage of `total_pages`.
    pub fn nonresident_pct(mut self, pct: u32) -> Self {
        self.config.nonresident_pct = pct;
        self
    }

    /// The configuration as currently set.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Validate and build the engine.
    pub fn try_build<O: PageOwner>(self, owner: O) -> Result<EvictionEngine<O>, ConfigError> {
        EvictionEngine::init(self.config, owner, self.total_pages)
    }

    /// Build the engine.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; use [`try_build`](Self::try_build)
    /// to handle the error instead.
    pub fn build<O: PageOwner>(self, owner: O) -> EvictionEngine<O> {
        match self.try_build(owner) {
            Ok(engine) => engine,
            Err(err) => panic!("invalid engine configuration: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ObjectId, PageId, PageIdentity};

    struct Idle;

    impl PageOwner for Idle {
        type Token = ();

        fn try_lock_owner(&self, _: PageId) -> Option<()> {
            Some(())
        }
        fn test_and_clear_reference(&self, _: PageId) -> bool {
            false
        }
        fn try_drop_swap(&self, _: PageId) -> bool {
            false
        }
        fn identity(&self, page: PageId) -> PageIdentity {
            PageIdentity::new(ObjectId(1), page.index() as u64, PageClass::Anon)
        }
        fn free_pages(&self) -> usize {
            0
        }
        fn free_target(&self) -> usize {
            0
        }
    }

    #[test]
    fn setters_land_in_config() {
        let builder = EngineBuilder::new(PolicyKind::Clock, 64)
            .ncpu(3)
            .ring_capacity(16)
            .trickle_batch(2)
            .inactive_pct(40)
            .class_limits(PageClass::Exec, 1, 20);
        let config = builder.config();
        assert_eq!(config.kind, PolicyKind::Clock);
        assert_eq!(config.ncpu, 3);
        assert_eq!(config.ring_capacity, 16);
        assert_eq!(config.trickle_batch, 2);
        assert_eq!(config.inactive_pct, 40);
        assert_eq!(config.limits(PageClass::Exec), ClassLimits::new(1, 20));
    }

    #[test]
    fn try_build_validates() {
        let err = EngineBuilder::new(PolicyKind::ClockPro, 64)
            .cold_target_pct(60)
            .cold_target_max_pct(50)
            .try_build(Idle)
            .unwrap_err();
        assert!(err.message().contains("cold_target"));

        let err = EngineBuilder::new(PolicyKind::Clock, 0)
            .try_build(Idle)
            .unwrap_err();
        assert!(err.message().contains("total_pages"));
    }

    #[test]
    fn build_produces_engine_of_kind() {
        let engine = EngineBuilder::new(PolicyKind::Clock, 16).ncpu(1).build(Idle);
        assert_eq!(engine.policy_kind(), PolicyKind::Clock);
        assert_eq!(engine.total_pages(), 16);
        assert_eq!(engine.cold_target(), None);

        let engine = EngineBuilder::new(PolicyKind::ClockPro, 16).ncpu(1).build(Idle);
        assert_eq!(engine.policy_kind(), PolicyKind::ClockPro);
        assert!(engine.cold_target().is_some());
    }

    #[test]
    #[should_panic(expected = "invalid engine configuration")]
    fn build_panics_on_invalid() {
        EngineBuilder::new(PolicyKind::Clock, 16).ncpu(0).build(Idle);
    }
}
