//! The eviction engine: locks, per-CPU realizer, scanner loop and public API.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────── EvictionEngine<O> ────────────────────────────┐
//!   │                                                                      │
//!   │  flags: Vec<Mutex<PageFlags>>      per-page interlocks               │
//!   │  rings: PendingRings               one bounded ring per CPU          │
//!   │  core:  Mutex<PolicyCore>          global lock                       │
//!   │           ├─ replacement: Clock | ClockPro  (queues, hands, history) │
//!   │           ├─ tuner                                                   │
//!   │           ├─ slots: class + generation per page                      │
//!   │           └─ metrics                                                 │
//!   │  scanner: Mutex<()>                one victim scanner at a time      │
//!   │  published: atomics                lock-free needs_scan / estimates  │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! Two levels: the per-page interlock and the global policy lock. The only
//! permitted nesting is global → interlock, and interlocks never nest. The
//! fault path (`page_*` intents, `page_realize`) takes only the interlock;
//! pushing onto a ring takes neither lock.
//!
//! The scanner drops the global lock before calling
//! [`PageOwner::try_lock_owner`] and re-validates the candidate (same queue,
//! same enqueue generation) after re-taking it, since the page may have been
//! freed and reused in between.
//!
//! ## Realization
//!
//! ```text
//!   page_activate(p)        interlock: intent = Activate
//!   page_realize(p)         interlock: pending = true; ring[cpu].push(p)
//!        │ ring full ──► flush_cpu(cpu) and push again
//!        │ still full ─► realize p directly under the global lock
//!   flush / idle trickle    global lock: pop, take intent, apply to queues
//! ```

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::config::{PolicyConfig, PolicyKind};
use crate::ds::pending_ring::PendingRings;
use crate::error::{ConfigError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::traits::{
    MetricsReset, MetricsSnapshotProvider, RealizerMetricsRecorder, ScanMetricsRecorder,
};
#[cfg(feature = "metrics")]
use crate::metrics::{EngineMetrics, PolicyMetricsSnapshot};
use crate::page::{Intent, PageClass, PageFlags, PageId, QueueTag, Realization};
use crate::policy::{PageSlot, PolicyContext, Replacement, ReplacementPolicy, Verdict};
use crate::traits::{PageOwner, PageProbe};
use crate::tuner::Tuner;

/// Pages handled per global-lock hold during a balance pass.
const BALANCE_BATCH: usize = 32;

static NEXT_CPU: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CPU_SLOT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Ring index bound to the calling thread, assigned round-robin on first use.
fn thread_cpu_slot() -> usize {
    CPU_SLOT.with(|slot| match slot.get() {
        Some(cpu) => cpu,
        None => {
            let cpu = NEXT_CPU.fetch_add(1, Ordering::Relaxed);
            slot.set(Some(cpu));
            cpu
        }
    })
}

/// Scanner steps allowed per `select_victim` call.
#[inline]
fn scan_budget(queued: usize) -> usize {
    queued.saturating_mul(4).saturating_add(16)
}

/// State behind the global lock.
struct PolicyCore {
    replacement: Replacement,
    tuner: Tuner,
    slots: Vec<PageSlot>,
    class_counts: [usize; 3],
    #[cfg(feature = "metrics")]
    metrics: EngineMetrics,
}

impl PolicyCore {
    fn policy(&self) -> &dyn ReplacementPolicy {
        self.replacement.policy()
    }

    fn queued(&self) -> usize {
        self.policy().queues().total_len()
    }

    /// Runs `f` against the policy with a context built from this core.
    fn apply<R>(
        &mut self,
        flags: &[Mutex<PageFlags>],
        probe: &dyn PageProbe,
        f: impl FnOnce(&mut dyn ReplacementPolicy, &mut PolicyContext<'_>) -> R,
    ) -> R {
        let mut cx = PolicyContext {
            flags,
            slots: &self.slots,
            probe,
            tuner: &self.tuner,
            #[cfg(feature = "metrics")]
            metrics: &mut self.metrics,
        };
        f(self.replacement.policy_mut(), &mut cx)
    }

    /// Applies one realization and keeps the per-class and generation
    /// bookkeeping in step with queue entry and exit.
    fn realize(
        &mut self,
        flags: &[Mutex<PageFlags>],
        probe: &dyn PageProbe,
        page: PageId,
        realization: Realization,
    ) {
        #[cfg(feature = "metrics")]
        self.metrics.record_realization(realization);
        let before = self.policy().queues().queue_of(page);
        if before.is_none() && matches!(realization, Realization::Insert(_) | Realization::Deactivate)
        {
            self.slots[page.index()].class = probe.identity(page).class;
        }
        self.apply(flags, probe, |policy, cx| match realization {
            Realization::Ignore => {}
            Realization::Insert(admission) => policy.insert(cx, page, admission),
            Realization::Activate => policy.activate(cx, page),
            Realization::Deactivate => policy.deactivate(cx, page),
            Realization::Remove => policy.remove(cx, page),
        });
        let after = self.policy().queues().queue_of(page);
        let slot = &mut self.slots[page.index()];
        match (before, after) {
            (None, Some(_)) => {
                slot.generation = slot.generation.wrapping_add(1);
                self.class_counts[slot.class.index()] += 1;
            }
            (Some(_), None) => self.class_counts[slot.class.index()] -= 1,
            _ => {}
        }
    }

    fn still_valid(&self, candidate: &Candidate) -> bool {
        self.policy().queues().queue_of(candidate.page) == Some(candidate.queue)
            && self.slots[candidate.page.index()].generation == candidate.generation
    }
}

/// A page offered by the hand, remembered across the unlocked window.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    page: PageId,
    queue: QueueTag,
    generation: u32,
}

/// A page walked by the balance hand, carried across the unlocked window.
#[derive(Debug, Clone, Copy)]
struct BalanceStep {
    candidate: Candidate,
    wants_swap: bool,
    swap_dropped: bool,
}

#[derive(Debug, Default)]
struct Published {
    needs_scan: AtomicBool,
    active: AtomicUsize,
    inactive: AtomicUsize,
    queued: AtomicUsize,
}

/// Page-cache eviction policy engine.
///
/// Shared across threads by reference (typically inside an `Arc`); every
/// operation except [`reinit`](Self::reinit) takes `&self`.
pub struct EvictionEngine<O: PageOwner> {
    owner: O,
    config: PolicyConfig,
    flags: Vec<Mutex<PageFlags>>,
    core: Mutex<PolicyCore>,
    scanner: Mutex<()>,
    rings: PendingRings,
    trickle_stamps: Box<[AtomicU64]>,
    epoch: Instant,
    published: Published,
}

impl<O: PageOwner> EvictionEngine<O> {
    /// Creates an engine for `total_pages` pages.
    pub fn init(config: PolicyConfig, owner: O, total_pages: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        if total_pages == 0 {
            return Err(ConfigError::new("total_pages must be > 0"));
        }
        if u32::try_from(total_pages).is_err() {
            return Err(ConfigError::new(format!(
                "total_pages must fit in 32 bits, got {total_pages}"
            )));
        }

        let core = PolicyCore {
            replacement: Replacement::new(&config, total_pages),
            tuner: Tuner::new(&config),
            slots: vec![PageSlot::default(); total_pages],
            class_counts: [0; 3],
            #[cfg(feature = "metrics")]
            metrics: EngineMetrics::default(),
        };
        let engine = Self {
            flags: (0..total_pages)
                .map(|_| Mutex::new(PageFlags::default()))
                .collect(),
            core: Mutex::new(core),
            scanner: Mutex::new(()),
            rings: PendingRings::new(config.ncpu, config.ring_capacity),
            trickle_stamps: (0..config.ncpu).map(|_| AtomicU64::new(0)).collect(),
            epoch: Instant::now(),
            published: Published::default(),
            owner,
            config,
        };
        engine.tune();
        debug!(
            kind = %engine.config.kind,
            total_pages,
            ncpu = engine.config.ncpu,
            ring_capacity = engine.config.ring_capacity,
            "eviction engine initialised"
        );
        Ok(engine)
    }

    /// Grows the page arena to `total_pages`; the history table is resized
    /// and forgets its records. Shrinking is ignored.
    pub fn reinit(&mut self, total_pages: usize) {
        let pages = total_pages.max(self.flags.len());
        self.flags
            .resize_with(pages, || Mutex::new(PageFlags::default()));
        let core = self.core.get_mut();
        core.slots.resize(pages, PageSlot::default());
        core.replacement.policy_mut().grow(pages);
        debug!(total_pages = pages, "eviction engine resized");
        self.tune();
    }

    pub fn owner(&self) -> &O {
        &self.owner
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.core.lock().policy().kind()
    }

    /// Size of the page arena.
    pub fn total_pages(&self) -> usize {
        self.flags.len()
    }

    /// Ring index the calling thread is bound to.
    pub fn current_cpu(&self) -> usize {
        thread_cpu_slot() % self.rings.ncpu()
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Takes the page's interlock.
    ///
    /// # Panics
    ///
    /// Panics if `page` is outside the arena.
    pub fn lock_page(&self, page: PageId) -> PageGuard<'_> {
        PageGuard {
            page,
            flags: self.flags[page.index()].lock(),
        }
    }

    pub fn page_activate(&self, page: PageId) {
        self.lock_page(page).activate();
    }

    pub fn page_deactivate(&self, page: PageId) {
        self.lock_page(page).deactivate();
    }

    pub fn page_enqueue(&self, page: PageId) {
        self.lock_page(page).enqueue();
    }

    pub fn page_dequeue(&self, page: PageId) {
        self.lock_page(page).dequeue();
    }

    /// Real queue the page is linked on.
    pub fn page_queue(&self, page: PageId) -> Option<QueueTag> {
        self.flags[page.index()].lock().queue
    }

    // -----------------------------------------------------------------------
    // Realizer
    // -----------------------------------------------------------------------

    /// Schedules the page's pending intent on the calling thread's ring.
    pub fn page_realize(&self, page: PageId) {
        self.page_realize_on(self.current_cpu(), page);
    }

    /// Schedules the page's pending intent on `cpu`'s ring.
    pub fn page_realize_on(&self, cpu: usize, page: PageId) {
        {
            let mut flags = self.flags[page.index()].lock();
            if flags.intent.is_none() || flags.pending {
                return;
            }
            flags.pending = true;
        }
        let ring = self.rings.ring(cpu);
        if ring.push(page).is_ok() {
            return;
        }
        trace!(cpu, %page, "pending ring full, flushing");
        self.flush_ring(cpu, true);
        if ring.push(page).is_err() {
            self.locked(|core| {
                #[cfg(feature = "metrics")]
                core.metrics.record_direct_realization();
                self.realize_locked(core, page);
            });
        }
    }

    /// Realizes the page's pending intent immediately.
    pub fn realize_now(&self, page: PageId) {
        self.locked(|core| self.realize_locked(core, page));
    }

    /// Drains the calling thread's ring.
    pub fn flush(&self) {
        self.flush_cpu(self.current_cpu());
    }

    /// Drains `cpu`'s ring.
    pub fn flush_cpu(&self, cpu: usize) {
        self.flush_ring(cpu, false);
    }

    /// Drains every ring.
    pub fn flush_all(&self) {
        for cpu in 0..self.rings.ncpu() {
            self.flush_ring(cpu, false);
        }
    }

    /// Pages waiting in rings.
    pub fn pending_pages(&self) -> usize {
        self.rings.total_pending()
    }

    /// Idle-time trickle on the calling thread's ring.
    pub fn idle(&self, resched: impl FnMut() -> bool) {
        self.idle_on(self.current_cpu(), resched);
    }

    /// Drains up to `trickle_batch` entries of `cpu`'s ring, at most once per
    /// `trickle_interval`, without ever waiting for the global lock.
    /// `resched` is polled before every entry; `true` ends the pass.
    pub fn idle_on(&self, cpu: usize, mut resched: impl FnMut() -> bool) {
        let cpu = cpu % self.rings.ncpu();
        let ring = self.rings.ring(cpu);
        if ring.is_empty() {
            return;
        }
        let now = (self.epoch.elapsed().as_nanos() as u64).max(1);
        let stamp = &self.trickle_stamps[cpu];
        let last = stamp.load(Ordering::Relaxed);
        let interval = self.config.trickle_interval.as_nanos() as u64;
        if last != 0 && now.saturating_sub(last) < interval {
            return;
        }
        if stamp
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let Some(mut core) = self.core.try_lock() else {
            return;
        };
        let mut drained = 0;
        while drained < self.config.trickle_batch {
            if resched() {
                break;
            }
            let Some(page) = ring.pop() else {
                break;
            };
            self.realize_locked(&mut core, page);
            drained += 1;
        }
        #[cfg(feature = "metrics")]
        core.metrics.record_trickle_pass(drained);
        self.publish(&core);
        trace!(cpu, drained, "idle trickle");
    }

    fn flush_ring(&self, cpu: usize, overflow: bool) {
        let ring = self.rings.ring(cpu);
        self.locked(|core| {
            let mut drained = 0;
            // concurrent pushes may refill the ring; one capacity's worth per flush
            for _ in 0..ring.capacity() {
                let Some(page) = ring.pop() else {
                    break;
                };
                self.realize_locked(core, page);
                drained += 1;
            }
            #[cfg(feature = "metrics")]
            {
                if overflow {
                    core.metrics.record_ring_overflow();
                }
                core.metrics.record_ring_flush(drained);
            }
            #[cfg(not(feature = "metrics"))]
            let _ = overflow;
            trace!(cpu, drained, "ring flushed");
        });
    }

    /// Takes the page's intent under its interlock, then applies it.
    fn realize_locked(&self, core: &mut PolicyCore, page: PageId) {
        let (intent, queued) = {
            let mut flags = self.flags[page.index()].lock();
            flags.pending = false;
            (flags.intent.take(), flags.is_queued())
        };
        let Some(intent) = intent else {
            return;
        };
        core.realize(&self.flags, &self.owner, page, intent.realization(queued));
    }

    // -----------------------------------------------------------------------
    // Scanner
    // -----------------------------------------------------------------------

    /// Whether the page daemon should run. Lock-free.
    pub fn needs_scan(&self) -> bool {
        self.published.needs_scan.load(Ordering::Relaxed)
    }

    /// `(active, inactive)` page estimate (`(hot, cold)` for CLOCK-Pro).
    /// Lock-free; may be slightly stale.
    pub fn estimate_pageable(&self) -> (usize, usize) {
        (
            self.published.active.load(Ordering::Relaxed),
            self.published.inactive.load(Ordering::Relaxed),
        )
    }

    /// Pages currently on a queue, as last published.
    pub fn queued_pages(&self) -> usize {
        self.published.queued.load(Ordering::Relaxed)
    }

    /// Recomputes targets from the owner's free-page counts.
    pub fn tune(&self) {
        let free = self.owner.free_pages();
        let free_target = self.owner.free_target();
        self.locked(|core| {
            let queued = core.queued();
            core.tuner.recompute(queued, free, free_target);
            core.replacement.policy_mut().retarget(&core.tuner);
            debug!(
                queued,
                target = core.policy().target(),
                floor = core.tuner.floor(),
                "targets tuned"
            );
        });
    }

    /// Inactive target (CLOCK) or cold target (CLOCK-Pro).
    pub fn target(&self) -> usize {
        self.core.lock().policy().target()
    }

    /// Current CLOCK-Pro cold target; `None` under CLOCK.
    pub fn cold_target(&self) -> Option<usize> {
        match &self.core.lock().replacement {
            Replacement::Clock(_) => None,
            Replacement::ClockPro(p) => Some(p.cold_target()),
        }
    }

    /// Opens a scan cycle: plans class protection and places the hand.
    pub fn scan_init(&self) {
        self.locked(|core| {
            let counts = core.class_counts;
            core.tuner.plan_cycle(counts);
            core.apply(&self.flags, &self.owner, |policy, cx| policy.scan_init(cx));
            debug!(
                anon = counts[PageClass::Anon.index()],
                file = counts[PageClass::File.index()],
                exec = counts[PageClass::Exec.index()],
                "scan cycle opened"
            );
        });
    }

    /// Closes a scan cycle.
    pub fn scan_fini(&self) {
        self.locked(|core| {
            core.apply(&self.flags, &self.owner, |policy, cx| policy.scan_fini(cx));
        });
    }

    /// Finds the next victim.
    ///
    /// Returns the page with its owner still locked through the token; the
    /// caller completes reclaim, then dequeues and frees the page. `None`
    /// when the hand finds nothing within its budget.
    pub fn select_victim(&self) -> Option<(PageId, O::Token)> {
        let _scanner = self.scanner.lock();
        let mut budget = scan_budget(self.core.lock().queued());
        let mut busy = 0u64;
        #[cfg(feature = "metrics")]
        self.core.lock().metrics.record_select_call();

        while budget > 0 {
            budget -= 1;
            let candidate = self.locked(|core| {
                #[cfg(feature = "metrics")]
                core.metrics.record_owner_busy(std::mem::take(&mut busy));
                let page =
                    core.apply(&self.flags, &self.owner, |policy, cx| policy.next_candidate(cx))?;
                #[cfg(feature = "metrics")]
                core.metrics.record_candidate();
                Some(Candidate {
                    page,
                    queue: core.policy().queues().queue_of(page)?,
                    generation: core.slots[page.index()].generation,
                })
            });
            let candidate = candidate?;

            let Some(token) = self.owner.try_lock_owner(candidate.page) else {
                trace!(page = %candidate.page, "owner busy, skipped");
                busy += 1;
                continue;
            };
            let referenced = self.owner.test_and_clear_reference(candidate.page);

            let verdict = self.locked(|core| {
                if !core.still_valid(&candidate) {
                    #[cfg(feature = "metrics")]
                    core.metrics.record_stale_candidate();
                    return None;
                }
                let verdict = core.apply(&self.flags, &self.owner, |policy, cx| {
                    policy.judge(cx, candidate.page, referenced)
                });
                #[cfg(feature = "metrics")]
                if verdict == Verdict::Victim {
                    core.metrics.record_victim();
                }
                Some(verdict)
            });
            if verdict == Some(Verdict::Victim) {
                trace!(page = %candidate.page, "victim selected");
                return Some((candidate.page, token));
            }
        }

        debug!(busy, "scan budget exhausted");
        #[cfg(feature = "metrics")]
        {
            let mut core = self.core.lock();
            core.metrics.record_owner_busy(busy);
            core.metrics.record_budget_exhausted();
        }
        None
    }

    /// Walks the active (hot) queue to relieve an inactive-target deficit
    /// and/or a swap-slot shortage.
    ///
    /// Pages are walked in batches under the global lock; swap is dropped
    /// with the global lock released and each page is re-validated before
    /// the policy finishes it.
    pub fn balance_queue(&self, swap_shortage: u32) {
        let _scanner = self.scanner.lock();
        let mut shortage = self.locked(|core| {
            core.apply(&self.flags, &self.owner, |policy, cx| {
                policy.balance_begin(cx, swap_shortage)
            })
        });
        let start = shortage;
        let mut budget = scan_budget(self.core.lock().queued());
        let mut batch: Vec<BalanceStep> = Vec::with_capacity(BALANCE_BATCH);

        while budget > 0 && !shortage.is_met() {
            let limit = if shortage.swap > 0 {
                BALANCE_BATCH
            } else {
                shortage.inactive.min(BALANCE_BATCH)
            }
            .min(budget);
            batch.clear();
            self.locked(|core| {
                let mut walked = Vec::with_capacity(limit);
                core.apply(&self.flags, &self.owner, |policy, cx| {
                    while walked.len() < limit {
                        let Some(page) = policy.balance_next(cx, &shortage) else {
                            break;
                        };
                        walked.push((page, policy.wants_swap(page)));
                    }
                });
                for (page, wants_swap) in walked {
                    let Some(queue) = core.policy().queues().queue_of(page) else {
                        continue;
                    };
                    batch.push(BalanceStep {
                        candidate: Candidate {
                            page,
                            queue,
                            generation: core.slots[page.index()].generation,
                        },
                        wants_swap,
                        swap_dropped: false,
                    });
                }
            });
            if batch.is_empty() {
                break;
            }
            budget = budget.saturating_sub(batch.len());

            let mut swap_left = shortage.swap;
            let mut busy = 0u64;
            for step in batch.iter_mut().filter(|s| s.wants_swap) {
                if swap_left == 0 {
                    break;
                }
                let page = step.candidate.page;
                let Some(token) = self.owner.try_lock_owner(page) else {
                    trace!(%page, "owner busy, swap kept");
                    busy += 1;
                    continue;
                };
                step.swap_dropped = self.owner.try_drop_swap(page);
                drop(token);
                if step.swap_dropped {
                    swap_left -= 1;
                }
            }

            self.locked(|core| {
                #[cfg(feature = "metrics")]
                core.metrics.record_owner_busy(busy);
                for step in &batch {
                    if step.swap_dropped {
                        shortage.swap = shortage.swap.saturating_sub(1);
                        #[cfg(feature = "metrics")]
                        core.metrics.record_swap_dropped();
                    }
                    if !core.still_valid(&step.candidate) {
                        #[cfg(feature = "metrics")]
                        core.metrics.record_stale_candidate();
                        continue;
                    }
                    core.apply(&self.flags, &self.owner, |policy, cx| {
                        policy.balance_visit(cx, step.candidate.page, &mut shortage)
                    });
                }
            });
            #[cfg(not(feature = "metrics"))]
            let _ = busy;
        }
        self.locked(|core| {
            core.apply(&self.flags, &self.owner, |policy, cx| policy.balance_end(cx));
        });
        debug!(
            swap_wanted = start.swap,
            swap_left = shortage.swap,
            inactive_wanted = start.inactive,
            inactive_left = shortage.inactive,
            "queues balanced"
        );
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Verifies linkage, flag mirrors and counters.
    ///
    /// Meaningful at a quiescent point: after `flush_all` with no thread
    /// mid-operation.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let core = self.core.lock();
        let policy = core.policy();
        policy.check_invariants()?;
        let queues = policy.queues();
        let mut counts = [0usize; 3];
        for (index, flags) in self.flags.iter().enumerate() {
            let page = PageId::new(index);
            let tagged = flags.lock().queue;
            let linked = queues.queue_of(page);
            if tagged != linked {
                return Err(InvariantError::new(format!(
                    "{page} tagged {tagged:?} but linked on {linked:?}"
                )));
            }
            if linked.is_some() {
                counts[core.slots[index].class.index()] += 1;
            }
        }
        if counts != core.class_counts {
            return Err(InvariantError::new(format!(
                "class counts {:?} but queues hold {counts:?}",
                core.class_counts
            )));
        }
        if policy.target() < core.tuner.floor() {
            return Err(InvariantError::new(format!(
                "target {} below floor {}",
                policy.target(),
                core.tuner.floor()
            )));
        }
        Ok(())
    }

    /// Copies the counters out.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> PolicyMetricsSnapshot {
        let core = self.core.lock();
        PolicyMetricsSnapshot {
            queued_pages: core.queued(),
            target: core.policy().target(),
            pending: self.rings.total_pending(),
            ..core.metrics.to_snapshot()
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn locked<R>(&self, f: impl FnOnce(&mut PolicyCore) -> R) -> R {
        let mut core = self.core.lock();
        let out = f(&mut core);
        self.publish(&core);
        out
    }

    fn publish(&self, core: &PolicyCore) {
        let policy = core.policy();
        let (active, inactive) = policy.pageable();
        self.published.active.store(active, Ordering::Relaxed);
        self.published.inactive.store(inactive, Ordering::Relaxed);
        self.published
            .queued
            .store(policy.queues().total_len(), Ordering::Relaxed);
        self.published
            .needs_scan
            .store(policy.needs_scan(), Ordering::Relaxed);
    }
}

#[cfg(feature = "metrics")]
impl<O: PageOwner> MetricsSnapshotProvider<PolicyMetricsSnapshot> for EvictionEngine<O> {
    fn snapshot(&self) -> PolicyMetricsSnapshot {
        self.metrics()
    }
}

#[cfg(feature = "metrics")]
impl<O: PageOwner> MetricsReset for EvictionEngine<O> {
    fn reset_metrics(&self) {
        self.core.lock().metrics = EngineMetrics::default();
    }
}

impl<O: PageOwner> std::fmt::Debug for EvictionEngine<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionEngine")
            .field("kind", &self.config.kind)
            .field("total_pages", &self.flags.len())
            .field("queued", &self.queued_pages())
            .field("pending", &self.pending_pages())
            .finish_non_exhaustive()
    }
}

/// A page's interlock, held.
///
/// Intents set through the guard never touch the global lock; they take
/// effect once the page is realized.
pub struct PageGuard<'a> {
    page: PageId,
    flags: MutexGuard<'a, PageFlags>,
}

impl PageGuard<'_> {
    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn activate(&mut self) {
        self.flags.set_intent(Intent::Activate);
    }

    pub fn deactivate(&mut self) {
        self.flags.set_intent(Intent::Deactivate);
    }

    pub fn enqueue(&mut self) {
        self.flags.set_intent(Intent::Enqueue);
    }

    pub fn dequeue(&mut self) {
        self.flags.set_intent(Intent::Dequeue);
    }

    /// Intent awaiting realization.
    pub fn intent(&self) -> Option<Intent> {
        self.flags.intent
    }

    /// Real queue membership.
    pub fn queue(&self) -> Option<QueueTag> {
        self.flags.queue
    }

    /// Whether the page sits in a ring.
    pub fn is_pending(&self) -> bool {
        self.flags.pending
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rustc_hash::FxHashSet;

    use super::*;
    use crate::page::{ObjectId, PageIdentity};

    #[derive(Default)]
    struct TestOwner {
        referenced: Mutex<FxHashSet<usize>>,
        busy: Mutex<FxHashSet<usize>>,
        free: AtomicUsize,
    }

    impl PageOwner for TestOwner {
        type Token = ();

        fn try_lock_owner(&self, page: PageId) -> Option<()> {
            (!self.busy.lock().contains(&page.index())).then_some(())
        }
        fn test_and_clear_reference(&self, page: PageId) -> bool {
            self.referenced.lock().remove(&page.index())
        }
        fn try_drop_swap(&self, _: PageId) -> bool {
            false
        }
        fn identity(&self, page: PageId) -> PageIdentity {
            let class = match page.index() % 3 {
                0 => PageClass::Anon,
                1 => PageClass::File,
                _ => PageClass::Exec,
            };
            PageIdentity::new(ObjectId(7), page.index() as u64, class)
        }
        fn free_pages(&self) -> usize {
            self.free.load(Ordering::Relaxed)
        }
        fn free_target(&self) -> usize {
            0
        }
    }

    fn engine(kind: PolicyKind, pages: usize) -> EvictionEngine<TestOwner> {
        let config = PolicyConfig {
            ncpu: 2,
            ring_capacity: 4,
            trickle_interval: Duration::ZERO,
            ..PolicyConfig::for_kind(kind)
        };
        EvictionEngine::init(config, TestOwner::default(), pages).unwrap()
    }

    /// Owner that notes whether the engine's global lock is held whenever
    /// one of its owner-lock callbacks runs.
    #[derive(Default)]
    struct LockWatch {
        engine: std::sync::OnceLock<std::sync::Weak<EvictionEngine<std::sync::Arc<LockWatch>>>>,
        calls: AtomicUsize,
        under_core_lock: AtomicUsize,
    }

    impl LockWatch {
        fn note(&self) {
            if let Some(engine) = self.engine.get().and_then(std::sync::Weak::upgrade) {
                self.calls.fetch_add(1, Ordering::Relaxed);
                if engine.core.is_locked() {
                    self.under_core_lock.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    impl PageOwner for LockWatch {
        type Token = ();

        fn try_lock_owner(&self, _: PageId) -> Option<()> {
            self.note();
            Some(())
        }
        fn test_and_clear_reference(&self, _: PageId) -> bool {
            false
        }
        fn try_drop_swap(&self, _: PageId) -> bool {
            self.note();
            true
        }
        fn identity(&self, page: PageId) -> PageIdentity {
            PageIdentity::new(ObjectId(3), page.index() as u64, PageClass::File)
        }
        fn free_pages(&self) -> usize {
            0
        }
        fn free_target(&self) -> usize {
            0
        }
    }

    #[test]
    fn init_rejects_zero_pages() {
        let err = EvictionEngine::init(PolicyConfig::default(), TestOwner::default(), 0)
            .unwrap_err();
        assert!(err.message().contains("total_pages"));
    }

    #[test]
    fn intent_waits_in_ring_until_flush() {
        let e = engine(PolicyKind::Clock, 8);
        let page = PageId::new(1);
        e.page_activate(page);
        e.page_realize_on(0, page);
        assert!(e.lock_page(page).is_pending());
        assert_eq!(e.page_queue(page), None);
        e.flush_cpu(0);
        assert_eq!(e.page_queue(page), Some(QueueTag::Active));
        assert!(!e.lock_page(page).is_pending());
        assert_eq!(e.lock_page(page).intent(), None);
        e.check_invariants().unwrap();
    }

    #[test]
    fn realize_without_intent_is_noop() {
        let e = engine(PolicyKind::Clock, 4);
        e.page_realize_on(0, PageId::new(0));
        assert_eq!(e.pending_pages(), 0);
    }

    #[test]
    fn full_ring_flushes_itself() {
        let e = engine(PolicyKind::Clock, 16);
        for i in 0..6 {
            e.page_activate(PageId::new(i));
            e.page_realize_on(1, PageId::new(i));
        }
        // four realized by the overflow flush, two still pending
        assert_eq!(e.queued_pages(), 4);
        assert_eq!(e.pending_pages(), 2);
        e.flush_all();
        assert_eq!(e.queued_pages(), 6);
        e.check_invariants().unwrap();
    }

    #[test]
    fn dequeue_while_pending_nets_to_zero() {
        let e = engine(PolicyKind::ClockPro, 8);
        let page = PageId::new(3);
        e.page_enqueue(page);
        e.page_realize_on(0, page);
        e.page_dequeue(page);
        e.page_realize_on(0, page);
        assert_eq!(e.pending_pages(), 1);
        e.flush_all();
        assert_eq!(e.page_queue(page), None);
        assert_eq!(e.queued_pages(), 0);
        e.check_invariants().unwrap();
    }

    #[test]
    fn idle_trickle_respects_resched() {
        let e = engine(PolicyKind::Clock, 8);
        for i in 0..3 {
            e.page_activate(PageId::new(i));
            e.page_realize_on(0, PageId::new(i));
        }
        e.idle_on(0, || true);
        assert_eq!(e.pending_pages(), 3);
        let mut budget = 2;
        e.idle_on(0, || {
            budget -= 1;
            budget < 0
        });
        assert_eq!(e.pending_pages(), 1);
    }

    #[test]
    fn idle_trickle_is_rate_limited() {
        let config = PolicyConfig {
            ncpu: 1,
            trickle_interval: Duration::from_secs(3600),
            ..PolicyConfig::for_kind(PolicyKind::Clock)
        };
        let e = EvictionEngine::init(config, TestOwner::default(), 8).unwrap();
        e.page_activate(PageId::new(0));
        e.page_realize_on(0, PageId::new(0));
        e.idle_on(0, || false);
        assert_eq!(e.pending_pages(), 0);
        e.page_activate(PageId::new(1));
        e.page_realize_on(0, PageId::new(1));
        e.idle_on(0, || false);
        assert_eq!(e.pending_pages(), 1);
    }

    #[test]
    fn clock_victim_after_deactivation() {
        let e = engine(PolicyKind::Clock, 8);
        for i in 0..4 {
            let page = PageId::new(i);
            e.page_activate(page);
            e.realize_now(page);
        }
        e.page_deactivate(PageId::new(2));
        e.realize_now(PageId::new(2));
        e.scan_init();
        let (victim, ()) = e.select_victim().unwrap();
        assert_eq!(victim, PageId::new(2));
        assert!(e.select_victim().is_none());
        e.scan_fini();
        e.check_invariants().unwrap();
    }

    #[test]
    fn busy_owner_is_skipped() {
        let e = engine(PolicyKind::Clock, 8);
        for i in [0, 3] {
            let page = PageId::new(i);
            e.page_deactivate(page);
            e.realize_now(page);
        }
        e.owner().busy.lock().insert(0);
        e.scan_init();
        let (victim, ()) = e.select_victim().unwrap();
        assert_eq!(victim, PageId::new(3));
        e.scan_fini();
    }

    #[test]
    fn estimates_and_needs_scan_are_published() {
        let e = engine(PolicyKind::Clock, 32);
        for i in 0..30 {
            let page = PageId::new(i);
            e.page_activate(page);
            e.realize_now(page);
        }
        e.tune();
        assert_eq!(e.estimate_pageable(), (30, 0));
        assert!(e.needs_scan());
        e.balance_queue(0);
        assert_eq!(e.estimate_pageable(), (21, 9));
        assert!(!e.needs_scan());
        e.check_invariants().unwrap();
    }

    #[test]
    fn stale_generation_is_detected() {
        let e = engine(PolicyKind::Clock, 4);
        let page = PageId::new(1);
        e.page_deactivate(page);
        e.realize_now(page);
        let candidate = {
            let core = e.core.lock();
            Candidate {
                page,
                queue: QueueTag::Inactive,
                generation: core.slots[1].generation,
            }
        };
        e.page_dequeue(page);
        e.realize_now(page);
        e.page_deactivate(page);
        e.realize_now(page);
        assert!(!e.core.lock().still_valid(&candidate));
    }

    #[test]
    fn reinit_grows_arena() {
        let mut e = engine(PolicyKind::ClockPro, 4);
        e.page_activate(PageId::new(3));
        e.realize_now(PageId::new(3));
        e.reinit(64);
        assert_eq!(e.total_pages(), 64);
        e.page_activate(PageId::new(63));
        e.realize_now(PageId::new(63));
        assert_eq!(e.queued_pages(), 2);
        e.reinit(8);
        assert_eq!(e.total_pages(), 64);
        e.check_invariants().unwrap();
    }

    #[test]
    fn thread_binding_is_stable() {
        let e = engine(PolicyKind::Clock, 4);
        assert_eq!(e.current_cpu(), e.current_cpu());
        let seen = AtomicBool::new(false);
        std::thread::scope(|s| {
            s.spawn(|| {
                let first = e.current_cpu();
                seen.store(first == e.current_cpu(), Ordering::Relaxed);
            });
        });
        assert!(seen.load(Ordering::Relaxed));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_track_realizations() {
        let e = engine(PolicyKind::Clock, 8);
        e.page_activate(PageId::new(0));
        e.realize_now(PageId::new(0));
        e.page_dequeue(PageId::new(0));
        e.realize_now(PageId::new(0));
        let snap = e.metrics();
        assert_eq!(snap.realized_inserts, 1);
        assert_eq!(snap.realized_removals, 1);
        assert_eq!(snap.queued_pages, 0);
        e.reset_metrics();
        assert_eq!(e.metrics().realized_inserts, 0);
    }

    #[test]
    fn owner_callbacks_run_without_global_lock() {
        for kind in [PolicyKind::Clock, PolicyKind::ClockPro] {
            let owner = std::sync::Arc::new(LockWatch::default());
            let config = PolicyConfig {
                ncpu: 1,
                class_limits: [crate::config::ClassLimits::new(0, 100); 3],
                ..PolicyConfig::for_kind(kind)
            };
            let e = std::sync::Arc::new(
                EvictionEngine::init(config, std::sync::Arc::clone(&owner), 16).unwrap(),
            );
            assert!(owner.engine.set(std::sync::Arc::downgrade(&e)).is_ok());

            for i in 0..12 {
                e.page_activate(PageId::new(i));
                e.realize_now(PageId::new(i));
            }
            e.tune();
            e.balance_queue(0);
            e.scan_init();
            let mut victims = Vec::new();
            while victims.len() < 4 {
                let Some((page, ())) = e.select_victim() else {
                    break;
                };
                e.page_dequeue(page);
                e.realize_now(page);
                victims.push(page);
            }
            e.scan_fini();
            assert!(!victims.is_empty(), "{kind}");
            // refaults: CLOCK-Pro admits them hot from history
            for &page in &victims {
                e.page_activate(page);
                e.realize_now(page);
            }
            let scanned = owner.calls.load(Ordering::Relaxed);
            e.balance_queue(4);

            assert!(owner.calls.load(Ordering::Relaxed) > scanned, "{kind}");
            assert_eq!(owner.under_core_lock.load(Ordering::Relaxed), 0, "{kind}");
            #[cfg(feature = "metrics")]
            assert!(e.metrics().swap_dropped >= 1, "{kind}");
            e.check_invariants().unwrap();
        }
    }
}
