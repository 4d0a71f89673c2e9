//! Shared owner for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pagekit::page::{ObjectId, PageClass, PageId, PageIdentity};
use pagekit::traits::PageOwner;

/// Owner with atomic per-page reference and busy bits.
pub struct TestOwner {
    referenced: Vec<AtomicBool>,
    busy: Vec<AtomicBool>,
    free: AtomicUsize,
    free_target: AtomicUsize,
}

impl TestOwner {
    pub fn new(pages: usize) -> Self {
        Self {
            referenced: (0..pages).map(|_| AtomicBool::new(false)).collect(),
            busy: (0..pages).map(|_| AtomicBool::new(false)).collect(),
            free: AtomicUsize::new(0),
            free_target: AtomicUsize::new(0),
        }
    }

    pub fn reference(&self, page: PageId) {
        self.referenced[page.index()].store(true, Ordering::Relaxed);
    }

    pub fn set_busy(&self, page: PageId, busy: bool) {
        self.busy[page.index()].store(busy, Ordering::Relaxed);
    }

    pub fn set_free(&self, free: usize, free_target: usize) {
        self.free.store(free, Ordering::Relaxed);
        self.free_target.store(free_target, Ordering::Relaxed);
    }
}

pub fn class_of(page: PageId) -> PageClass {
    match page.index() % 3 {
        0 => PageClass::Anon,
        1 => PageClass::File,
        _ => PageClass::Exec,
    }
}

impl PageOwner for TestOwner {
    type Token = ();

    fn try_lock_owner(&self, page: PageId) -> Option<()> {
        (!self.busy[page.index()].load(Ordering::Relaxed)).then_some(())
    }

    fn test_and_clear_reference(&self, page: PageId) -> bool {
        self.referenced[page.index()].swap(false, Ordering::Relaxed)
    }

    fn try_drop_swap(&self, _page: PageId) -> bool {
        true
    }

    fn identity(&self, page: PageId) -> PageIdentity {
        PageIdentity::new(ObjectId(42), page.index() as u64, class_of(page))
    }

    fn free_pages(&self) -> usize {
        self.free.load(Ordering::Relaxed)
    }

    fn free_target(&self) -> usize {
        self.free_target.load(Ordering::Relaxed)
    }
}
