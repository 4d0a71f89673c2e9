//! Hashed, cyclically-aged history of evicted page identities.
//!
//! CLOCK-Pro needs to know whether a page being faulted back in was evicted
//! "recently", i.e. within one revolution of the cold hand. Keeping a real
//! LRU list of evicted identities would cost a node per record and a lock
//! per touch. Instead each identity is reduced to a 32-bit cookie and dropped
//! into a small fixed bucket; buckets age lazily against a global cycle
//! counter.
//!
//! ## Architecture
//!
//! ```text
//!   hash(object, index) ─┬─ low bits & mask ─► bucket
//!                        └─ high 32 bits    ─► cookie (0 reserved = empty)
//!
//!   Bucket { cycle, cur, cookies[15] }
//!            ┌────┬────┬────┬────┬─────┬────┐
//!            │ c7 │ c8 │ -- │ c4 │ ... │ c6 │     cur ─► oldest slot
//!            └────┴────┴────┴────┴─────┴────┘
//! ```
//!
//! ## Aging
//!
//! `advance()` is called once per cold-hand step. It accumulates 15 per call
//! and bumps `cycle_target` each time the accumulator passes the number of
//! pages, so a bucket sees 15 expirations per full revolution of the hand:
//! exactly its capacity. A bucket that is touched after `n` missed cycles
//! expires its `n` oldest slots (all of them if `n >= 15`) before the
//! lookup or insert proceeds.
//!
//! ## Behavior
//! - `record(id)`: writes the cookie into the oldest slot, overwriting it
//! - `lookup_remove(id)`: consumes a matching cookie; at most one hit per record
//! - Collisions are tolerated: a false positive only promotes a page early
//!
//! ## Performance
//! - `record` / `lookup_remove`: O(15) after O(min(n, 15)) rotation
//! - `advance`: O(1)

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::page::PageIdentity;

/// Cookies held by one bucket.
pub const BUCKET_SLOTS: usize = 15;

const EMPTY: u32 = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    cycle: u32,
    cur: u8,
    cookies: [u32; BUCKET_SLOTS],
}

impl Bucket {
    /// Catches up with `target`, expiring one slot per missed cycle.
    /// Returns the number of live records that expired.
    fn rotate(&mut self, target: u32) -> u32 {
        let missed = target.wrapping_sub(self.cycle);
        self.cycle = target;
        if missed == 0 {
            return 0;
        }
        if missed as usize >= BUCKET_SLOTS {
            let live = self.cookies.iter().filter(|&&c| c != EMPTY).count() as u32;
            self.cookies = [EMPTY; BUCKET_SLOTS];
            self.cur = 0;
            return live;
        }
        let mut expired = 0;
        let mut cur = self.cur as usize;
        for _ in 0..missed {
            if self.cookies[cur] != EMPTY {
                expired += 1;
            }
            self.cookies[cur] = EMPTY;
            cur = (cur + 1) % BUCKET_SLOTS;
        }
        self.cur = cur as u8;
        expired
    }
}

/// Approximate record of recently evicted cold pages.
#[derive(Debug)]
pub struct NonResidentTable {
    buckets: Vec<Bucket>,
    mask: u64,
    cycle_target: u32,
    frac: u64,
    span: u64,
    expired: u32,
    overwritten: u32,
}

impl NonResidentTable {
    /// Creates a table sized for `total_pages` resident pages, remembering
    /// roughly `pct` percent of that many evictions.
    pub fn new(total_pages: usize, pct: u32) -> Self {
        let nbuckets = Self::bucket_count(total_pages, pct);
        Self {
            buckets: vec![Bucket::default(); nbuckets],
            mask: nbuckets as u64 - 1,
            cycle_target: 0,
            frac: 0,
            span: total_pages.max(1) as u64,
            expired: 0,
            overwritten: 0,
        }
    }

    /// Bucket count for a table: `ceil(total * pct / 100 / 15)`, rounded up
    /// to a power of two.
    pub fn bucket_count(total_pages: usize, pct: u32) -> usize {
        let records = total_pages.saturating_mul(pct as usize) / 100;
        records.div_ceil(BUCKET_SLOTS).max(1).next_power_of_two()
    }

    /// Number of buckets.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Upper bound on the number of records held at once.
    pub fn capacity(&self) -> usize {
        self.buckets.len() * BUCKET_SLOTS
    }

    /// Current global cycle.
    pub fn cycle_target(&self) -> u32 {
        self.cycle_target
    }

    /// Rebuilds the table for a new page count, forgetting every record.
    pub fn resize(&mut self, total_pages: usize, pct: u32) {
        *self = Self::new(total_pages, pct);
    }

    /// Records an evicted identity.
    pub fn record(&mut self, id: &PageIdentity) {
        let (slot, cookie) = self.locate(id);
        let target = self.cycle_target;
        let bucket = &mut self.buckets[slot];
        self.expired += bucket.rotate(target);
        let cur = bucket.cur as usize;
        if bucket.cookies[cur] != EMPTY {
            self.overwritten += 1;
        }
        bucket.cookies[cur] = cookie;
        bucket.cur = ((cur + 1) % BUCKET_SLOTS) as u8;
    }

    /// Looks up an identity and consumes its record on a hit.
    pub fn lookup_remove(&mut self, id: &PageIdentity) -> bool {
        let (slot, cookie) = self.locate(id);
        let target = self.cycle_target;
        let bucket = &mut self.buckets[slot];
        self.expired += bucket.rotate(target);
        match bucket.cookies.iter().position(|&c| c == cookie) {
            Some(i) => {
                bucket.cookies[i] = EMPTY;
                true
            }
            None => false,
        }
    }

    /// One rotation-accounting step, taken per cold-hand step.
    pub fn advance(&mut self) {
        self.frac += BUCKET_SLOTS as u64;
        while self.frac >= self.span {
            self.frac -= self.span;
            self.cycle_target = self.cycle_target.wrapping_add(1);
        }
    }

    /// Returns and resets the count of records that aged out (or were
    /// overwritten) since the last call: test periods that ended unused.
    pub fn take_expired(&mut self) -> u32 {
        let n = self.expired + self.overwritten;
        self.expired = 0;
        self.overwritten = 0;
        n
    }

    /// Live records, counted without aging any bucket.
    pub fn occupancy(&self) -> usize {
        self.buckets
            .iter()
            .map(|b| b.cookies.iter().filter(|&&c| c != EMPTY).count())
            .sum()
    }

    fn locate(&self, id: &PageIdentity) -> (usize, u32) {
        let mut hasher = FxHasher::default();
        id.object.hash(&mut hasher);
        id.index.hash(&mut hasher);
        let hash = hasher.finish();
        let cookie = match (hash >> 32) as u32 {
            EMPTY => 1,
            c => c,
        };
        ((hash & self.mask) as usize, cookie)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert!(self.buckets.len().is_power_of_two());
        assert_eq!(self.mask, self.buckets.len() as u64 - 1);
        assert!(self.frac < self.span);
        for bucket in &self.buckets {
            assert!((bucket.cur as usize) < BUCKET_SLOTS);
        }
    }
}
