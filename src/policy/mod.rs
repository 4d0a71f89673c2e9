//! Replacement policies.
//!
//! A policy owns its page queues and per-page policy bits; the engine owns
//! the locks, the rings and the flag words. Every call into a policy happens
//! with the global lock held and receives a [`PolicyContext`] giving it the
//! collaborators it may touch.
//!
//! ## Scanner Protocol
//!
//! ```text
//!   engine (global lock)      engine (unlocked)            engine (global lock)
//!   ────────────────────      ─────────────────            ────────────────────
//!   next_candidate() ──page──► try_lock_owner(page) ──ok──► revalidate(page)
//!                              test_and_clear_reference      judge(page, referenced)
//!                                    │ busy                     │
//!                                    └─► skip                   ├─ Keep   ─► loop
//!                                                               └─ Victim ─► return
//! ```
//!
//! `next_candidate` advances the hand before returning, so a page skipped
//! because its owner was busy is not offered again until the hand wraps.

pub mod clock;
pub mod clock_pro;

use parking_lot::Mutex;

use crate::config::{PolicyConfig, PolicyKind};
use crate::ds::page_queue::PageQueues;
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::EngineMetrics;
use crate::page::{Admission, PageClass, PageFlags, PageId, QueueTag};
use crate::traits::PageProbe;
use crate::tuner::Tuner;

pub use clock::ClockPolicy;
pub use clock_pro::ClockProPolicy;

/// Engine-side record of a queued page.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageSlot {
    /// Class captured when the page entered the engine.
    pub class: PageClass,
    /// Bumped every time the page enters the engine.
    pub generation: u32,
}

impl Default for PageSlot {
    fn default() -> Self {
        Self {
            class: PageClass::Anon,
            generation: 0,
        }
    }
}

/// Everything a policy may touch besides its own state.
pub(crate) struct PolicyContext<'a> {
    pub flags: &'a [Mutex<PageFlags>],
    pub slots: &'a [PageSlot],
    pub probe: &'a dyn PageProbe,
    pub tuner: &'a Tuner,
    #[cfg(feature = "metrics")]
    pub metrics: &'a mut EngineMetrics,
}

impl PolicyContext<'_> {
    /// Mirrors a linkage change into the page's flag word.
    ///
    /// Takes the interlock; the global lock is already held, which is the
    /// permitted order.
    #[inline]
    pub fn mirror(&self, page: PageId, queue: Option<QueueTag>) {
        self.flags[page.index()].lock().queue = queue;
    }

    #[inline]
    pub fn class_of(&self, page: PageId) -> PageClass {
        self.slots[page.index()].class
    }

    /// Whether the tuner shields this page's class in the current cycle.
    #[inline]
    pub fn is_protected(&self, page: PageId) -> bool {
        self.tuner.is_protected(self.class_of(page))
    }
}

/// Links `page` at the tail of `queue`, moving it if already linked.
#[inline]
pub(crate) fn link_tail(
    queues: &mut PageQueues,
    cx: &PolicyContext<'_>,
    queue: QueueTag,
    page: PageId,
) {
    queues.move_to_back(queue, page);
    cx.mirror(page, Some(queue));
}

/// Unlinks `page`; returns the queue it left.
#[inline]
pub(crate) fn unlink(
    queues: &mut PageQueues,
    cx: &PolicyContext<'_>,
    page: PageId,
) -> Option<QueueTag> {
    let queue = queues.remove(page);
    if queue.is_some() {
        cx.mirror(page, None);
    }
    queue
}

/// Scanner's decision about a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Reclaim the page; the caller keeps the owner lock.
    Victim,
    /// Leave the page resident.
    Keep,
}

/// Work left for a balance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shortage {
    pub swap: u32,
    pub inactive: usize,
}

impl Shortage {
    #[inline]
    pub fn is_met(&self) -> bool {
        self.swap == 0 && self.inactive == 0
    }
}

/// Operations every replacement policy provides.
///
/// Called only with the global lock held.
pub(crate) trait ReplacementPolicy {
    fn kind(&self) -> PolicyKind;
    fn queues(&self) -> &PageQueues;
    fn grow(&mut self, total_pages: usize);

    fn insert(&mut self, cx: &mut PolicyContext<'_>, page: PageId, admission: Admission);
    fn activate(&mut self, cx: &mut PolicyContext<'_>, page: PageId);
    fn deactivate(&mut self, cx: &mut PolicyContext<'_>, page: PageId);
    fn remove(&mut self, cx: &mut PolicyContext<'_>, page: PageId);

    /// Picks up new targets after the tuner ran.
    fn retarget(&mut self, tuner: &Tuner);
    fn scan_init(&mut self, cx: &mut PolicyContext<'_>);
    fn scan_fini(&mut self, cx: &mut PolicyContext<'_>);
    fn next_candidate(&mut self, cx: &mut PolicyContext<'_>) -> Option<PageId>;
    fn judge(&mut self, cx: &mut PolicyContext<'_>, page: PageId, referenced: bool) -> Verdict;

    fn balance_begin(&mut self, cx: &mut PolicyContext<'_>, swap_shortage: u32) -> Shortage;
    /// Advances the balance hand one page; `None` once the walk is over.
    fn balance_next(&mut self, cx: &mut PolicyContext<'_>, shortage: &Shortage) -> Option<PageId>;
    /// Whether dropping `page`'s swap backing counts against the shortage.
    fn wants_swap(&self, page: PageId) -> bool;
    /// Finishes a walked page once the owner was consulted.
    fn balance_visit(&mut self, cx: &mut PolicyContext<'_>, page: PageId, shortage: &mut Shortage);
    fn balance_end(&mut self, cx: &mut PolicyContext<'_>);

    fn needs_scan(&self) -> bool;
    /// `(active, inactive)` in CLOCK terms; `(hot, cold)` for CLOCK-Pro.
    fn pageable(&self) -> (usize, usize);
    /// Inactive target (CLOCK) or current cold target (CLOCK-Pro).
    fn target(&self) -> usize;
    fn check_invariants(&self) -> Result<(), InvariantError>;
}

/// Enum dispatch over the available policies.
#[derive(Debug)]
pub(crate) enum Replacement {
    Clock(ClockPolicy),
    ClockPro(ClockProPolicy),
}

impl Replacement {
    pub fn new(config: &PolicyConfig, total_pages: usize) -> Self {
        match config.kind {
            PolicyKind::Clock => Replacement::Clock(ClockPolicy::new(total_pages)),
            PolicyKind::ClockPro => Replacement::ClockPro(ClockProPolicy::new(config, total_pages)),
        }
    }

    #[inline]
    pub fn policy(&self) -> &dyn ReplacementPolicy {
        match self {
            Replacement::Clock(p) => p,
            Replacement::ClockPro(p) => p,
        }
    }

    #[inline]
    pub fn policy_mut(&mut self) -> &mut dyn ReplacementPolicy {
        match self {
            Replacement::Clock(p) => p,
            Replacement::ClockPro(p) => p,
        }
    }
}

/// Counts pages per queue by walking the links, for invariant checks.
pub(crate) fn walk_len(queues: &PageQueues, queue: QueueTag) -> Result<usize, InvariantError> {
    let walked = queues.iter(queue).count();
    if walked != queues.len(queue) {
        return Err(InvariantError::new(format!(
            "{queue:?} queue holds {walked} pages but counts {}",
            queues.len(queue)
        )));
    }
    for page in queues.iter(queue) {
        if queues.queue_of(page) != Some(queue) {
            return Err(InvariantError::new(format!(
                "{page} walked on {queue:?} but linked on {:?}",
                queues.queue_of(page)
            )));
        }
    }
    Ok(walked)
}
