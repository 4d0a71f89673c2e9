//! Per-page identity, queue membership and pending intent.
//!
//! The engine never owns a page: it addresses pages by [`PageId`], a stable
//! index into the arena sized at `init`. What it does own is a small flag
//! word per page ([`PageFlags`]) guarded by the page's interlock, holding the
//! page's current real queue and the intent waiting to be realized.
//!
//! ## Intent Realization
//!
//! ```text
//!   fault path (interlock only)          realizer (global lock + interlock)
//!   ───────────────────────────          ─────────────────────────────────
//!   intent = Some(Activate)   ──ring──►  take intent
//!   intent = Some(Dequeue)               realization(queued?) ─► policy op
//!        (last write wins)               queue = new tag
//! ```
//!
//! | Intent       | not queued                       | queued       |
//! |--------------|----------------------------------|--------------|
//! | `Activate`   | `Insert(Admission::Referenced)`  | `Activate`   |
//! | `Enqueue`    | `Insert(Admission::Speculative)` | `Ignore`     |
//! | `Deactivate` | `Deactivate`                     | `Deactivate` |
//! | `Dequeue`    | `Ignore`                         | `Remove`     |
//!
//! Because an intent names a desired final state rather than a delta,
//! setting the same intent twice before realization is the same as setting
//! it once, and a `Dequeue` issued before an `Enqueue` was ever realized
//! cancels it without touching any queue.

use std::fmt;

/// Stable index of a page in the engine's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub(crate) u32);

impl PageId {
    /// Creates a page id from an arena index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 32 bits.
    #[inline]
    pub fn new(index: usize) -> Self {
        let index = u32::try_from(index).expect("page index exceeds u32::MAX");
        Self(index)
    }

    /// Returns the arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pg#{}", self.0)
    }
}

/// Identity of the object (anon region, vnode, ...) that owns a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Consumer class a page is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageClass {
    /// Anonymous (application) memory.
    Anon,
    /// File-backed cache.
    File,
    /// Executable-backed cache.
    Exec,
}

impl PageClass {
    /// All classes, in counter order.
    pub const ALL: [PageClass; 3] = [PageClass::Anon, PageClass::File, PageClass::Exec];

    /// Index into per-class arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            PageClass::Anon => 0,
            PageClass::File => 1,
            PageClass::Exec => 2,
        }
    }
}

/// Identity of a page as seen by its owner: `(object, index)` plus class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageIdentity {
    pub object: ObjectId,
    pub index: u64,
    pub class: PageClass,
}

impl PageIdentity {
    #[inline]
    pub fn new(object: ObjectId, index: u64, class: PageClass) -> Self {
        Self {
            object,
            index,
            class,
        }
    }
}

/// Real queue a page is linked on.
///
/// CLOCK uses `Active`/`Inactive`; CLOCK-Pro uses `New`/`Cold`/`Hot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueTag {
    Active,
    Inactive,
    New,
    Cold,
    Hot,
}

impl QueueTag {
    pub(crate) const COUNT: usize = 5;

    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            QueueTag::Active => 0,
            QueueTag::Inactive => 1,
            QueueTag::New => 2,
            QueueTag::Cold => 3,
            QueueTag::Hot => 4,
        }
    }
}

/// Desired final state of a page, applied later by the realizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Page was referenced: queue it, or treat the reference as a hit.
    Activate,
    /// Page is a good reclaim candidate.
    Deactivate,
    /// Page was brought in speculatively (read-ahead).
    Enqueue,
    /// Page is leaving the engine (freed).
    Dequeue,
}

/// How a newly queued page was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Activated by a real reference.
    Referenced,
    /// Enqueued by read-ahead; not yet confirmed.
    Speculative,
}

/// Queue operation that realizes an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realization {
    Ignore,
    Insert(Admission),
    Activate,
    Deactivate,
    Remove,
}

impl Intent {
    /// Maps an intent onto the queue operation it requires, given whether
    /// the page is currently linked on a real queue.
    #[inline]
    pub fn realization(self, queued: bool) -> Realization {
        match (self, queued) {
            (Intent::Activate, false) => Realization::Insert(Admission::Referenced),
            (Intent::Activate, true) => Realization::Activate,
            (Intent::Enqueue, false) => Realization::Insert(Admission::Speculative),
            (Intent::Enqueue, true) => Realization::Ignore,
            (Intent::Deactivate, _) => Realization::Deactivate,
            (Intent::Dequeue, false) => Realization::Ignore,
            (Intent::Dequeue, true) => Realization::Remove,
        }
    }
}

/// Flag word guarded by a page's interlock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageFlags {
    /// Real queue membership; written only with the global lock held too.
    pub queue: Option<QueueTag>,
    /// Pending intent, if any.
    pub intent: Option<Intent>,
    /// Page sits in some per-CPU ring awaiting realization.
    pub pending: bool,
}

impl PageFlags {
    #[inline]
    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    /// Records `intent`, replacing any earlier one.
    #[inline]
    pub fn set_intent(&mut self, intent: Intent) {
        self.intent = Some(intent);
    }
}
