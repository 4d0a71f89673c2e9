//! CLOCK-Pro.
//!
//! Scan-resistant replacement over three queues. Pages are classified
//! **hot** (proven reuse, never evicted directly) or **cold** (eviction
//! candidates). A cold page may be in its **test period**: if it is
//! referenced again before the test ends it becomes hot. Cold pages evicted
//! while still in test leave a cookie in the [`NonResidentTable`]; a fault on
//! such a page brings it straight back as hot.
//!
//! ## Architecture
//!
//! ```text
//!   insert ─► New: [n1]─[n2]─[n3] ──rotate (len > max(cold_target/4, min))──┐
//!                                                                            ▼
//!             Cold: [c1]─[c2]─[c3]─[c4] ◄──────── demote (hot hand) ─────────┤
//!                    │ cold hand: head ─► tail, then judge                   │
//!                    ├─ referenced + test    ─► promote ─► Hot tail (hot)    │
//!                    ├─ referenced, no test  ─► start test ─► Hot tail       │
//!                    ├─ unreferenced + test  ─► record history, victim       │
//!                    └─ unreferenced         ─► victim                       │
//!                                                                            │
//!             Hot:  [h1]─[c5]─[h2]─[h3] ──hot hand while ncold < target──────┘
//!                    hot pages and cold pages kept for retest
//! ```
//!
//! ## Page Bits
//!
//! | Bit           | Meaning                                                  |
//! |---------------|----------------------------------------------------------|
//! | `HOT`         | Page is hot; otherwise cold                              |
//! | `TEST`        | Cold page within its test period                         |
//! | `INITIAL_REF` | Fault-time reference not yet cleared by new-queue rotation |
//! | `SPECULATIVE` | Read-ahead page not yet confirmed by a reference         |
//! | `SOFT_REF`    | Activation of an already-queued page                     |
//!
//! ## Cold Target
//!
//! The cold target starts at the tuner's base (`cold_target_pct` of queued
//! pages). With `adaptive_cold_target` on, a history hit (a page refaulting
//! within its test period) raises it by one page and a test that ends unused
//! lowers it by one; the result is clamped to
//! `[floor, max(floor, queued * cold_target_max_pct / 100)]`.
//!
//! ## Liveness
//!
//! If the cold queue is empty when the cold hand needs a page, the whole new
//! queue is rotated into it; if it is still empty the hot head is forced
//! cold. Only when every queue is empty is there no candidate.

use tracing::trace;

use crate::config::{PolicyConfig, PolicyKind};
use crate::ds::nonresident::NonResidentTable;
use crate::ds::page_queue::{MarkerId, PageQueues};
use crate::error::InvariantError;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{ClockProMetricsRecorder, ScanMetricsRecorder};
use crate::page::{Admission, PageId, QueueTag};
use crate::policy::{
    PolicyContext, ReplacementPolicy, Shortage, Verdict, link_tail, unlink, walk_len,
};
use crate::tuner::Tuner;

const BALANCE_HAND: MarkerId = MarkerId::new(0);
const MARKERS: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ProBits(u8);

impl ProBits {
    const HOT: u8 = 1 << 0;
    const TEST: u8 = 1 << 1;
    const INITIAL_REF: u8 = 1 << 2;
    const SPECULATIVE: u8 = 1 << 3;
    const SOFT_REF: u8 = 1 << 4;

    #[inline]
    fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }

    #[inline]
    fn clear(&mut self, bit: u8) {
        self.0 &= !bit;
    }

    /// Clears `bit`, returning whether it was set.
    #[inline]
    fn take(&mut self, bit: u8) -> bool {
        let was = self.has(bit);
        self.clear(bit);
        was
    }
}

#[derive(Debug)]
pub struct ClockProPolicy {
    queues: PageQueues,
    bits: Vec<ProBits>,
    history: NonResidentTable,
    nonresident_pct: u32,
    /// Queued pages.
    npages: usize,
    /// Queued pages that are not hot.
    ncold: usize,
    base_target: usize,
    adjust: i64,
    cold_target: usize,
    adaptive: bool,
    max_pct: u32,
    new_queue_min: usize,
}

impl ClockProPolicy {
    pub fn new(config: &PolicyConfig, total_pages: usize) -> Self {
        Self {
            queues: PageQueues::new(total_pages, MARKERS),
            bits: vec![ProBits::default(); total_pages],
            history: NonResidentTable::new(total_pages, config.nonresident_pct),
            nonresident_pct: config.nonresident_pct,
            npages: 0,
            ncold: 0,
            base_target: 1,
            adjust: 0,
            cold_target: 1,
            adaptive: config.adaptive_cold_target,
            max_pct: config.cold_target_max_pct,
            new_queue_min: config.new_queue_min,
        }
    }

    /// Current cold target.
    pub fn cold_target(&self) -> usize {
        self.cold_target
    }

    pub fn ncold(&self) -> usize {
        self.ncold
    }

    pub fn npages(&self) -> usize {
        self.npages
    }

    pub fn history(&self) -> &NonResidentTable {
        &self.history
    }

    pub fn is_hot(&self, page: PageId) -> bool {
        self.bits[page.index()].has(ProBits::HOT)
    }

    pub fn in_test(&self, page: PageId) -> bool {
        self.bits[page.index()].has(ProBits::TEST)
    }

    fn feedback(&mut self, cx: &PolicyContext<'_>, delta: i64) {
        if !self.adaptive {
            return;
        }
        let bound = self.npages as i64;
        self.adjust = (self.adjust + delta).clamp(-bound, bound);
        self.cold_target = cx
            .tuner
            .clamp_target(self.base_target as i64 + self.adjust, self.max_pct);
    }

    /// Applies history records that aged out as ended test periods.
    fn absorb_expired(&mut self, cx: &mut PolicyContext<'_>) {
        let expired = self.history.take_expired();
        if expired > 0 {
            self.feedback(cx, -(expired as i64));
            #[cfg(feature = "metrics")]
            cx.metrics.record_test_expired(expired as u64);
        }
    }

    fn new_to_cold(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        if self.bits[page.index()].take(ProBits::INITIAL_REF) {
            cx.probe.test_and_clear_reference(page);
        }
        link_tail(&mut self.queues, cx, QueueTag::Cold, page);
    }

    fn rotate_new(&mut self, cx: &mut PolicyContext<'_>) {
        let limit = (self.cold_target / 4).max(self.new_queue_min);
        while self.queues.len(QueueTag::New) > limit {
            let Some(page) = self.queues.front(QueueTag::New) else {
                break;
            };
            self.new_to_cold(cx, page);
        }
    }

    /// Demotes hot pages until the cold count reaches its target, visiting
    /// each hot-queue page at most once.
    fn hot_hand(&mut self, cx: &mut PolicyContext<'_>) {
        let mut budget = self.queues.len(QueueTag::Hot);
        while self.ncold < self.cold_target && budget > 0 {
            budget -= 1;
            let Some(page) = self.queues.front(QueueTag::Hot) else {
                break;
            };
            let bits = &mut self.bits[page.index()];
            if !bits.has(ProBits::HOT) {
                // cold page parked here by the cold hand
                if bits.take(ProBits::TEST) {
                    self.feedback(cx, -1);
                    #[cfg(feature = "metrics")]
                    cx.metrics.record_test_expired(1);
                }
                link_tail(&mut self.queues, cx, QueueTag::Cold, page);
                continue;
            }
            let referenced =
                bits.take(ProBits::SOFT_REF) | cx.probe.test_and_clear_reference(page);
            if referenced {
                link_tail(&mut self.queues, cx, QueueTag::Hot, page);
            } else {
                self.demote(cx, page);
            }
        }
    }

    fn demote(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        self.bits[page.index()].clear(ProBits::HOT);
        self.ncold += 1;
        link_tail(&mut self.queues, cx, QueueTag::Cold, page);
        trace!(%page, "hot page demoted");
        #[cfg(feature = "metrics")]
        cx.metrics.record_hot_to_cold_demotion();
    }

    fn promote(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        let bits = &mut self.bits[page.index()];
        bits.clear(ProBits::TEST);
        bits.set(ProBits::HOT);
        self.ncold -= 1;
        // only history hits raise the cold target
        link_tail(&mut self.queues, cx, QueueTag::Hot, page);
        trace!(%page, "cold page promoted");
        #[cfg(feature = "metrics")]
        cx.metrics.record_cold_to_hot_promotion();
    }

    /// Refills an empty cold queue from the new queue, then from the hot head.
    fn takeover(&mut self, cx: &mut PolicyContext<'_>) {
        if !self.queues.is_empty(QueueTag::Cold) {
            return;
        }
        let mut took = false;
        while let Some(page) = self.queues.front(QueueTag::New) {
            self.new_to_cold(cx, page);
            took = true;
        }
        if !took && let Some(page) = self.queues.front(QueueTag::Hot) {
            if self.bits[page.index()].has(ProBits::HOT) {
                self.demote(cx, page);
            } else {
                link_tail(&mut self.queues, cx, QueueTag::Cold, page);
            }
            took = true;
        }
        if took {
            trace!(cold = self.queues.len(QueueTag::Cold), "cold queue taken over");
            #[cfg(feature = "metrics")]
            cx.metrics.record_takeover();
        }
    }
}

impl ReplacementPolicy for ClockProPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::ClockPro
    }

    fn queues(&self) -> &PageQueues {
        &self.queues
    }

    fn grow(&mut self, total_pages: usize) {
        self.queues.grow(total_pages);
        if self.bits.len() < total_pages {
            self.bits.resize(total_pages, ProBits::default());
        }
        self.history.resize(total_pages, self.nonresident_pct);
    }

    fn insert(&mut self, cx: &mut PolicyContext<'_>, page: PageId, admission: Admission) {
        debug_assert!(self.queues.queue_of(page).is_none(), "{page} already queued");
        self.npages += 1;
        match admission {
            Admission::Speculative => {
                self.bits[page.index()] = ProBits(ProBits::SPECULATIVE);
                self.ncold += 1;
                link_tail(&mut self.queues, cx, QueueTag::New, page);
            }
            Admission::Referenced => {
                let identity = cx.probe.identity(page);
                if self.history.lookup_remove(&identity) {
                    self.bits[page.index()] = ProBits(ProBits::HOT);
                    link_tail(&mut self.queues, cx, QueueTag::Hot, page);
                    self.feedback(cx, 1);
                    trace!(%page, "history hit, admitted hot");
                    #[cfg(feature = "metrics")]
                    cx.metrics.record_nonresident_hit();
                } else {
                    self.bits[page.index()] = ProBits(ProBits::TEST | ProBits::INITIAL_REF);
                    self.ncold += 1;
                    link_tail(&mut self.queues, cx, QueueTag::New, page);
                    #[cfg(feature = "metrics")]
                    cx.metrics.record_test_start();
                }
                self.absorb_expired(cx);
            }
        }
    }

    fn activate(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        if self.bits[page.index()].has(ProBits::SPECULATIVE) {
            // read-ahead confirmed: classify as a normal referenced insert
            self.remove(cx, page);
            self.insert(cx, page, Admission::Referenced);
        } else {
            self.bits[page.index()].set(ProBits::SOFT_REF);
        }
    }

    fn deactivate(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        if self.queues.queue_of(page).is_none() {
            return;
        }
        cx.probe.test_and_clear_reference(page);
        self.bits[page.index()].clear(ProBits::SOFT_REF);
    }

    fn remove(&mut self, cx: &mut PolicyContext<'_>, page: PageId) {
        if unlink(&mut self.queues, cx, page).is_none() {
            return;
        }
        if !self.bits[page.index()].has(ProBits::HOT) {
            self.ncold -= 1;
        }
        self.npages -= 1;
        self.bits[page.index()] = ProBits::default();
    }

    fn retarget(&mut self, tuner: &Tuner) {
        self.base_target = tuner.target();
        let adjust = if self.adaptive { self.adjust } else { 0 };
        self.cold_target = tuner.clamp_target(self.base_target as i64 + adjust, self.max_pct);
    }

    fn scan_init(&mut self, _cx: &mut PolicyContext<'_>) {}

    fn scan_fini(&mut self, _cx: &mut PolicyContext<'_>) {}

    fn next_candidate(&mut self, cx: &mut PolicyContext<'_>) -> Option<PageId> {
        self.rotate_new(cx);
        self.hot_hand(cx);
        self.history.advance();
        self.absorb_expired(cx);
        self.takeover(cx);

        let page = self.queues.front(QueueTag::Cold)?;
        link_tail(&mut self.queues, cx, QueueTag::Cold, page);
        Some(page)
    }

    fn judge(&mut self, cx: &mut PolicyContext<'_>, page: PageId, referenced: bool) -> Verdict {
        debug_assert_eq!(self.queues.queue_of(page), Some(QueueTag::Cold));
        let bits = &mut self.bits[page.index()];
        let referenced = referenced | bits.take(ProBits::SOFT_REF);

        if bits.has(ProBits::SPECULATIVE) {
            if !referenced {
                trace!(%page, "unconfirmed read-ahead, victim");
                return Verdict::Victim;
            }
            bits.clear(ProBits::SPECULATIVE);
            bits.set(ProBits::TEST);
            link_tail(&mut self.queues, cx, QueueTag::Hot, page);
            #[cfg(feature = "metrics")]
            {
                cx.metrics.record_test_start();
                cx.metrics.record_kept_referenced();
            }
            return Verdict::Keep;
        }

        if referenced {
            if bits.has(ProBits::TEST) {
                self.promote(cx, page);
            } else {
                bits.set(ProBits::TEST);
                link_tail(&mut self.queues, cx, QueueTag::Hot, page);
                #[cfg(feature = "metrics")]
                cx.metrics.record_test_start();
            }
            #[cfg(feature = "metrics")]
            cx.metrics.record_kept_referenced();
            return Verdict::Keep;
        }

        if cx.is_protected(page) {
            trace!(%page, class = ?cx.class_of(page), "class protected, kept cold");
            #[cfg(feature = "metrics")]
            cx.metrics.record_kept_protected();
            return Verdict::Keep;
        }

        if bits.take(ProBits::TEST) {
            let identity = cx.probe.identity(page);
            self.history.record(&identity);
            self.absorb_expired(cx);
            #[cfg(feature = "metrics")]
            cx.metrics.record_nonresident_record();
        }
        Verdict::Victim
    }

    fn balance_begin(&mut self, _cx: &mut PolicyContext<'_>, swap_shortage: u32) -> Shortage {
        self.queues.marker_insert_head(BALANCE_HAND, QueueTag::Hot);
        Shortage {
            swap: swap_shortage,
            inactive: 0,
        }
    }

    fn balance_next(&mut self, _cx: &mut PolicyContext<'_>, shortage: &Shortage) -> Option<PageId> {
        if shortage.swap == 0 {
            return None;
        }
        let page = self.queues.page_after_marker(BALANCE_HAND)?;
        self.queues.marker_move_after(BALANCE_HAND, page);
        Some(page)
    }

    fn wants_swap(&self, page: PageId) -> bool {
        self.bits[page.index()].has(ProBits::HOT)
    }

    fn balance_visit(&mut self, _cx: &mut PolicyContext<'_>, _page: PageId, _shortage: &mut Shortage) {}

    fn balance_end(&mut self, _cx: &mut PolicyContext<'_>) {
        self.queues.marker_remove(BALANCE_HAND);
    }

    fn needs_scan(&self) -> bool {
        self.ncold < self.cold_target
    }

    fn pageable(&self) -> (usize, usize) {
        (self.npages - self.ncold, self.ncold)
    }

    fn target(&self) -> usize {
        self.cold_target
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        let new = walk_len(&self.queues, QueueTag::New)?;
        let cold = walk_len(&self.queues, QueueTag::Cold)?;
        let hot = walk_len(&self.queues, QueueTag::Hot)?;
        for queue in [QueueTag::Active, QueueTag::Inactive] {
            if !self.queues.is_empty(queue) {
                return Err(InvariantError::new(format!("CLOCK-Pro page on {queue:?} queue")));
            }
        }
        if new + cold + hot != self.npages {
            return Err(InvariantError::new(format!(
                "npages {} but queues hold {}",
                self.npages,
                new + cold + hot
            )));
        }
        for queue in [QueueTag::New, QueueTag::Cold] {
            if let Some(page) = self.queues.iter(queue).find(|&p| self.is_hot(p)) {
                return Err(InvariantError::new(format!("hot {page} on {queue:?} queue")));
            }
        }
        let hot_pages = self.queues.iter(QueueTag::Hot).filter(|&p| self.is_hot(p)).count();
        if self.npages - self.ncold != hot_pages {
            return Err(InvariantError::new(format!(
                "ncold {} disagrees with {} hot of {} queued",
                self.ncold, hot_pages, self.npages
            )));
        }
        if let Some((index, _)) = self
            .bits
            .iter()
            .enumerate()
            .find(|&(i, b)| b.0 != 0 && self.queues.queue_of(PageId::new(i)).is_none())
        {
            return Err(InvariantError::new(format!(
                "pg#{index} carries policy bits but is not queued"
            )));
        }
        Ok(())
    }
}
