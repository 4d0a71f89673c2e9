//! Per-CPU bounded ring of pages awaiting intent realization.
//!
//! The fault path pushes without taking any lock; the realizer pops the
//! whole ring under the global lock in one go. `ArrayQueue` is a bounded
//! MPMC ring, so a thread migrating between CPUs mid-push, or a foreign
//! thread draining the ring, is still safe.
//!
//! ```text
//!   page_realize ──push──► [ pg#4 | pg#9 | pg#2 | ... ] ──pop──► realizer
//!                            oldest             newest     (FIFO per ring)
//! ```

use crossbeam_queue::ArrayQueue;

use crate::page::PageId;

/// One CPU's ring of pending pages.
#[derive(Debug)]
pub struct PendingRing {
    queue: ArrayQueue<PageId>,
}

impl PendingRing {
    /// Creates a ring holding up to `capacity` pages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    /// Pushes `page`; hands it back if the ring is full.
    #[inline]
    pub fn push(&self, page: PageId) -> Result<(), PageId> {
        self.queue.push(page)
    }

    /// Pops the oldest pending page.
    #[inline]
    pub fn pop(&self) -> Option<PageId> {
        self.queue.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// The full set of rings, one per CPU.
#[derive(Debug)]
pub struct PendingRings {
    rings: Box<[PendingRing]>,
}

impl PendingRings {
    pub fn new(ncpu: usize, capacity: usize) -> Self {
        Self {
            rings: (0..ncpu).map(|_| PendingRing::new(capacity)).collect(),
        }
    }

    /// Ring for `cpu`, wrapping indices beyond the CPU count.
    #[inline]
    pub fn ring(&self, cpu: usize) -> &PendingRing {
        &self.rings[cpu % self.rings.len()]
    }

    /// Number of rings.
    #[inline]
    pub fn ncpu(&self) -> usize {
        self.rings.len()
    }

    /// Pages pending across all rings.
    pub fn total_pending(&self) -> usize {
        self.rings.iter().map(PendingRing::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_fifo() {
        let ring = PendingRing::new(4);
        for i in 0..3 {
            ring.push(PageId::new(i)).unwrap();
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), Some(PageId::new(0)));
        assert_eq!(ring.pop(), Some(PageId::new(1)));
        assert_eq!(ring.pop(), Some(PageId::new(2)));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_hands_page_back() {
        let ring = PendingRing::new(2);
        ring.push(PageId::new(0)).unwrap();
        ring.push(PageId::new(1)).unwrap();
        assert!(ring.is_full());
        assert_eq!(ring.push(PageId::new(2)), Err(PageId::new(2)));
    }

    #[test]
    fn cpu_index_wraps() {
        let rings = PendingRings::new(2, 8);
        rings.ring(3).push(PageId::new(5)).unwrap();
        assert_eq!(rings.ring(1).pop(), Some(PageId::new(5)));
        assert_eq!(rings.total_pending(), 0);
    }

    #[test]
    fn concurrent_pushes_are_all_seen() {
        let ring = std::sync::Arc::new(PendingRing::new(1024));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ring = ring.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        ring.push(PageId::new(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut seen: Vec<_> = std::iter::from_fn(|| ring.pop()).map(PageId::index).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..400).collect::<Vec<_>>());
    }
}
