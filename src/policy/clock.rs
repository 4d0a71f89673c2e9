//! Two-queue CLOCK.
//!
//! The baseline policy: every page entering the engine goes to the tail of
//! the **active** queue; demotion moves pages to the **inactive** queue,
//! where a single hand looks for victims.
//!
//! ## Architecture
//!
//! ```text
//!   Active:    head ─► [balance hand] ─ [A] ─ [B] ─ [C] ◄── tail ◄── insert / activate
//!                             │ balance_queue: deactivate until inactive >= target
//!                             ▼
//!   Inactive:  head ─► [D] ─ [scan hand] ─ [E] ─ [F] ◄── tail ◄── deactivate
//!                                  │ select_victim
//!                                  ├─ referenced       ─► active tail
//!                                  ├─ class protected  ─► active tail
//!                                  └─ otherwise        ─► victim
//! ```
//!
//! Victims stay linked on the inactive queue until the caller frees them and
//! realizes a dequeue; the hand has already moved past them.

use tracing::trace;

use crate::config::PolicyKind;
use crate::ds::page_queue::{MarkerId, PageQueues};
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::traits::ScanMetricsRecorder;
use crate::page::{Admission, PageId, QueueTag};
use crate::policy::{
    PolicyContext, ReplacementPolicy, Shortage, Verdict, link_tail, unlink, walk_len,
};
use crate::tuner::Tuner;

const SCAN_HAND: MarkerId = MarkerId::new(0);
const BALANCE_HAND: MarkerId = MarkerId::new(1);
const MARKERS: u32 = 2;

#[derive(Debug)]
pub struct ClockPolicy {
    queues: PageQueues,
    inactive_target: usize,
}

impl ClockPolicy {
    pub fn new(total_pages: usize) -> Self {
        Self {
            queues: PageQueues::new(total_pages, MARKERS),
            inactive_target: 1,
        }
    }

    /// Pages the inactive queue is short of its target.
    pub fn inactive_shortage(&self) -> usize {
        self.inactive_target
            .saturating_sub(self.queues.len(QueueTag::Inactive))
    }
}

impl ReplacementPolicy for ClockPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Clock
    }

    fn queues(&self) -> &PageQueues {
        &self.queues
    }

    fn grow(&mut self, total_pages: usize) {
        self.queues.grow(total_pages);
    }

    fn insert(&mut self, cx: &mut PolicyContext<'_>, page: PageId, _admission: Admission) {
        link_tail(&mut self.queues, cx, QueueTag::Active, page);
    }

    fn activate(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        link_tail(&mut self.queues, cx, QueueTag::Active, page);
    }

    fn deactivate(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        cx.probe.test_and_clear_reference(page);
        link_tail(&mut self.queues, cx, QueueTag::Inactive, page);
    }

    fn remove(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        unlink(&mut self.queues, cx, page);
    }

    fn retarget(&mut self, tuner: &Tuner) {
        self.inactive_target = tuner.target();
    }

    fn scan_init(&mut self, _cx: &mut PolicyContext<'_>) {
        self.queues.marker_insert_head(SCAN_HAND, QueueTag::Inactive);
    }

    fn scan_fini(&mut self, _cx: &mut PolicyContext<'_>) {
        self.queues.marker_remove(SCAN_HAND);
    }

    fn next_candidate(&mut self, _cx: &mut PolicyContext<'_>) -> Option<PageId> {
        if self.queues.marker_queue(SCAN_HAND).is_none() {
            self.queues.marker_insert_head(SCAN_HAND, QueueTag::Inactive);
        }
        let page = self.queues.page_after_marker(SCAN_HAND)?;
        self.queues.marker_move_after(SCAN_HAND, page);
        Some(page)
    }

    fn judge(&mut self, cx: &mut PolicyContext<'_>, page: PageId, referenced: bool) -> Verdict {
        debug_assert_eq!(self.queues.queue_of(page), Some(QueueTag::Inactive));
        if referenced {
            trace!(%page, "referenced, reactivated");
            link_tail(&mut self.queues, cx, QueueTag::Active, page);
            #[cfg(feature = "metrics")]
            cx.metrics.record_kept_referenced();
            return Verdict::Keep;
        }
        if cx.is_protected(page) {
            trace!(%page, class = ?cx.class_of(page), "class protected, reactivated");
            link_tail(&mut self.queues, cx, QueueTag::Active, page);
            #[cfg(feature = "metrics")]
            cx.metrics.record_kept_protected();
            return Verdict::Keep;
        }
        Verdict::Victim
    }

    fn balance_begin(&mut self, _cx: &mut PolicyContext<'_>, swap_shortage: u32) -> Shortage {
        self.queues.marker_insert_head(BALANCE_HAND, QueueTag::Active);
        Shortage {
            swap: swap_shortage,
            inactive: self.inactive_shortage(),
        }
    }

    fn balance_next(&mut self, _cx: &mut PolicyContext<'_>, shortage: &Shortage) -> Option<PageId> {
        if shortage.is_met() {
            return None;
        }
        let page = self.queues.page_after_marker(BALANCE_HAND)?;
        self.queues.marker_move_after(BALANCE_HAND, page);
        Some(page)
    }

    fn wants_swap(&self, _page: PageId) -> bool {
        true
    }

    fn balance_visit(&mut self, cx: &mut PolicyContext<'_>, page: PageId, shortage: &mut Shortage) {
        if shortage.inactive == 0 {
            return;
        }
        self.deactivate(cx, page);
        shortage.inactive -= 1;
        #[cfg(feature = "metrics")]
        cx.metrics.record_balance_deactivation();
    }

    fn balance_end(&mut self, _cx: &mut PolicyContext<'_>) {
        self.queues.marker_remove(BALANCE_HAND);
    }

    fn needs_scan(&self) -> bool {
        self.queues.len(QueueTag::Inactive) < self.inactive_target
    }

    fn pageable(&self) -> (usize, usize) {
        (
            self.queues.len(QueueTag::Active),
            self.queues.len(QueueTag::Inactive),
        )
    }

    fn target(&self) -> usize {
        self.inactive_target
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        let active = walk_len(&self.queues, QueueTag::Active)?;
        let inactive = walk_len(&self.queues, QueueTag::Inactive)?;
        for queue in [QueueTag::New, QueueTag::Cold, QueueTag::Hot] {
            if !self.queues.is_empty(queue) {
                return Err(InvariantError::new(format!("CLOCK page on {queue:?} queue")));
            }
        }
        if active + inactive != self.queues.total_len() {
            return Err(InvariantError::new("CLOCK queue total mismatch"));
        }
        Ok(())
    }
}
