//! Synthetic page frames and the objects mapped into them.
//!
//! A trace key `k` names page `k % PAGES_PER_OBJECT` of object
//! `k / PAGES_PER_OBJECT`. Owner locks are per object, so every resident
//! page of one object is busy while any of them is locked. Each frame
//! carries a reference bit and a swap-backing bit; the free list is a plain
//! stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use pagekit::page::{ObjectId, PageClass, PageId, PageIdentity};
use pagekit::traits::PageOwner;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use rustc_hash::FxHashMap;

/// Pages per synthetic object.
pub const PAGES_PER_OBJECT: u64 = 1024;

const EMPTY: u64 = u64::MAX;

#[derive(Debug)]
struct Frame {
    key: AtomicU64,
    referenced: AtomicBool,
    swap_backed: AtomicBool,
}

impl Frame {
    fn new() -> Self {
        Self {
            key: AtomicU64::new(EMPTY),
            referenced: AtomicBool::new(false),
            swap_backed: AtomicBool::new(false),
        }
    }
}

/// Fixed pool of frames implementing [`PageOwner`].
#[derive(Debug)]
pub struct Universe {
    frames: Box<[Frame]>,
    objects: Mutex<FxHashMap<ObjectId, Arc<Mutex<()>>>>,
    free: Mutex<Vec<PageId>>,
    free_target: usize,
    class: PageClass,
}

impl Universe {
    /// Creates `frames` free frames whose pages all belong to `class`.
    pub fn new(frames: usize, free_target: usize, class: PageClass) -> Self {
        Self {
            frames: (0..frames).map(|_| Frame::new()).collect(),
            objects: Mutex::new(FxHashMap::default()),
            // lowest frame numbers are handed out first
            free: Mutex::new((0..frames).rev().map(PageId::new).collect()),
            free_target,
            class,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames.len()
    }

    /// Takes a free frame.
    pub fn allocate(&self) -> Option<PageId> {
        self.free.lock().pop()
    }

    /// Returns a frame to the free list.
    pub fn release(&self, page: PageId) {
        debug_assert_eq!(self.key_of(page), None, "{page} released while mapped");
        self.free.lock().push(page);
    }

    /// Maps trace key `key` into `page` and marks it referenced.
    pub fn map(&self, page: PageId, key: u64, referenced: bool) {
        let frame = &self.frames[page.index()];
        frame.key.store(key, Ordering::Relaxed);
        frame.referenced.store(referenced, Ordering::Relaxed);
        frame.swap_backed.store(self.class == PageClass::Anon, Ordering::Relaxed);
    }

    /// Unmaps `page`, returning the key it held.
    pub fn unmap(&self, page: PageId) -> Option<u64> {
        let frame = &self.frames[page.index()];
        frame.referenced.store(false, Ordering::Relaxed);
        frame.swap_backed.store(false, Ordering::Relaxed);
        match frame.key.swap(EMPTY, Ordering::Relaxed) {
            EMPTY => None,
            key => Some(key),
        }
    }

    /// Sets the page's reference bit, as an access through the MMU would.
    pub fn reference(&self, page: PageId) {
        self.frames[page.index()]
            .referenced
            .store(true, Ordering::Relaxed);
    }

    pub fn key_of(&self, page: PageId) -> Option<u64> {
        match self.frames[page.index()].key.load(Ordering::Relaxed) {
            EMPTY => None,
            key => Some(key),
        }
    }

    /// Lock guarding the object that owns trace key `key`.
    fn object_lock(&self, key: u64) -> Arc<Mutex<()>> {
        let object = ObjectId(key / PAGES_PER_OBJECT);
        Arc::clone(self.objects.lock().entry(object).or_default())
    }

    /// Identity of trace key `key`.
    pub fn identity_of(&self, key: u64) -> PageIdentity {
        PageIdentity::new(
            ObjectId(key / PAGES_PER_OBJECT),
            key % PAGES_PER_OBJECT,
            self.class,
        )
    }
}

impl PageOwner for Universe {
    type Token = ArcMutexGuard<RawMutex, ()>;

    fn try_lock_owner(&self, page: PageId) -> Option<Self::Token> {
        let key = self.key_of(page)?;
        let token = self.object_lock(key).try_lock_arc()?;
        // remapped to another object while the lock was taken
        let same_object = self
            .key_of(page)
            .is_some_and(|now| now / PAGES_PER_OBJECT == key / PAGES_PER_OBJECT);
        same_object.then_some(token)
    }

    fn test_and_clear_reference(&self, page: PageId) -> bool {
        self.frames[page.index()]
            .referenced
            .swap(false, Ordering::Relaxed)
    }

    fn try_drop_swap(&self, page: PageId) -> bool {
        self.frames[page.index()]
            .swap_backed
            .swap(false, Ordering::Relaxed)
    }

    fn identity(&self, page: PageId) -> PageIdentity {
        let key = self.frames[page.index()].key.load(Ordering::Relaxed);
        self.identity_of(key)
    }

    fn free_pages(&self) -> usize {
        self.free.lock().len()
    }

    fn free_target(&self) -> usize {
        self.free_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cycle_through_free_list() {
        let u = Universe::new(2, 0, PageClass::File);
        let a = u.allocate().unwrap();
        let b = u.allocate().unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        assert!(u.allocate().is_none());
        u.release(a);
        assert_eq!(u.free_pages(), 1);
    }

    #[test]
    fn map_sets_identity_and_reference() {
        let u = Universe::new(1, 0, PageClass::Anon);
        let page = u.allocate().unwrap();
        u.map(page, PAGES_PER_OBJECT * 3 + 5, true);
        let id = u.identity(page);
        assert_eq!((id.object, id.index, id.class), (ObjectId(3), 5, PageClass::Anon));
        assert!(u.test_and_clear_reference(page));
        assert!(!u.test_and_clear_reference(page));
        assert!(u.try_drop_swap(page));
        assert_eq!(u.unmap(page), Some(PAGES_PER_OBJECT * 3 + 5));
        assert_eq!(u.unmap(page), None);
    }

    #[test]
    fn owner_lock_is_exclusive() {
        let u = Universe::new(1, 0, PageClass::File);
        let page = u.allocate().unwrap();
        assert!(u.try_lock_owner(page).is_none(), "unmapped frame has no owner");
        u.map(page, 7, false);
        let token = u.try_lock_owner(page).unwrap();
        assert!(u.try_lock_owner(page).is_none());
        drop(token);
        assert!(u.try_lock_owner(page).is_some());
    }

    #[test]
    fn sibling_pages_share_the_object_lock() {
        let u = Universe::new(3, 0, PageClass::File);
        let a = u.allocate().unwrap();
        let b = u.allocate().unwrap();
        let c = u.allocate().unwrap();
        u.map(a, 3, false);
        u.map(b, PAGES_PER_OBJECT - 1, false);
        u.map(c, PAGES_PER_OBJECT, false);

        let token = u.try_lock_owner(a).unwrap();
        assert!(u.try_lock_owner(b).is_none());
        assert!(u.try_lock_owner(c).is_some());
        drop(token);
        assert!(u.try_lock_owner(b).is_some());
    }
}
