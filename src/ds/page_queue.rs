//! Arena-indexed page queues with hand markers.
//!
//! Every queue of a policy shares one link table: a page can only be on one
//! queue at a time, so one `(prev, next, queue)` triple per page is enough.
//! Links are node indices, never pointers, so a page record can be moved
//! between queues in O(1) without any aliasing.
//!
//! ## Architecture
//!
//! ```text
//!   links: Vec<Link>
//!   ┌────────────┬──────────────────────────────────────────────┐
//!   │ node       │ Link { prev, next, queue }                   │
//!   ├────────────┼──────────────────────────────────────────────┤
//!   │ 0 (hand)   │ { prev: None,    next: Some(3), Inactive }   │  markers
//!   │ 1 (hand)   │ { prev: None,    next: None,    None     }   │
//!   │ 2 (pg#0)   │ { prev: Some(3), next: None,    Inactive }   │  pages
//!   │ 3 (pg#1)   │ { prev: Some(0), next: Some(2), Inactive }   │
//!   └────────────┴──────────────────────────────────────────────┘
//!
//!   Inactive: head ─► [hand 0] ◄──► [pg#1] ◄──► [pg#0] ◄── tail   (len 2)
//! ```
//!
//! ## Hands
//!
//! A hand is a marker node spliced into a queue. Pages can be inserted or
//! removed around it while the global lock is dropped and the hand still
//! knows where it is: the next page to visit is simply the next page node
//! after the marker. Markers are skipped by `front`, `pop_front` and `iter`
//! and do not count towards `len`.
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use crate::page::{PageId, QueueTag};

/// Identifier of a hand marker node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(u32);

impl MarkerId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<u32>,
    next: Option<u32>,
    queue: Option<QueueTag>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ends {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

/// Set of FIFO page queues sharing one link table.
#[derive(Debug)]
pub struct PageQueues {
    links: Vec<Link>,
    markers: u32,
    ends: [Ends; QueueTag::COUNT],
}

impl PageQueues {
    /// Creates queues for `pages` pages and `markers` hand markers.
    pub fn new(pages: usize, markers: u32) -> Self {
        let mut links = Vec::with_capacity(markers as usize + pages);
        links.resize_with(markers as usize + pages, Link::default);
        Self {
            links,
            markers,
            ends: [Ends::default(); QueueTag::COUNT],
        }
    }

    /// Number of page slots in the link table.
    pub fn page_capacity(&self) -> usize {
        self.links.len() - self.markers as usize
    }

    /// Grows the link table to hold at least `pages` pages.
    ///
    /// Existing linkage is preserved; shrinking is not supported.
    pub fn grow(&mut self, pages: usize) {
        let want = self.markers as usize + pages;
        if want > self.links.len() {
            self.links.resize_with(want, Link::default);
        }
    }

    /// Number of pages on `queue`.
    #[inline]
    pub fn len(&self, queue: QueueTag) -> usize {
        self.ends[queue.slot()].len
    }

    /// Returns `true` if `queue` holds no pages.
    #[inline]
    pub fn is_empty(&self, queue: QueueTag) -> bool {
        self.len(queue) == 0
    }

    /// Number of pages on all queues.
    pub fn total_len(&self) -> usize {
        self.ends.iter().map(|e| e.len).sum()
    }

    /// Queue `page` is linked on, if any.
    #[inline]
    pub fn queue_of(&self, page: PageId) -> Option<QueueTag> {
        self.links
            .get(self.page_node(page) as usize)
            .and_then(|link| link.queue)
    }

    /// Appends an unlinked page to the tail of `queue`.
    ///
    /// # Panics
    ///
    /// Panics if the page is already linked on a queue.
    pub fn push_back(&mut self, queue: QueueTag, page: PageId) {
        let node = self.page_node(page);
        assert!(
            self.links[node as usize].queue.is_none(),
            "{page} already on {:?}",
            self.links[node as usize].queue
        );
        self.attach_back(queue, node);
        self.ends[queue.slot()].len += 1;
    }

    /// Unlinks `page`; returns the queue it was on.
    pub fn remove(&mut self, page: PageId) -> Option<QueueTag> {
        let node = self.page_node(page);
        let queue = self.links.get(node as usize)?.queue?;
        self.detach(node);
        self.ends[queue.slot()].len -= 1;
        Some(queue)
    }

    /// Moves `page` to the tail of `queue`, unlinking it from wherever it is.
    pub fn move_to_back(&mut self, queue: QueueTag, page: PageId) {
        self.remove(page);
        self.push_back(queue, page);
    }

    /// First page on `queue`, skipping markers.
    pub fn front(&self, queue: QueueTag) -> Option<PageId> {
        self.first_page_from(self.ends[queue.slot()].head)
    }

    /// Removes and returns the first page on `queue`.
    pub fn pop_front(&mut self, queue: QueueTag) -> Option<PageId> {
        let page = self.front(queue)?;
        self.remove(page);
        Some(page)
    }

    /// Iterates the pages of `queue` from head to tail.
    pub fn iter(&self, queue: QueueTag) -> PageQueueIter<'_> {
        PageQueueIter {
            queues: self,
            current: self.ends[queue.slot()].head,
        }
    }

    /// Splices `marker` in at the head of `queue`.
    ///
    /// A marker already linked elsewhere is moved.
    pub fn marker_insert_head(&mut self, marker: MarkerId, queue: QueueTag) {
        let node = self.marker_node(marker);
        if self.links[node as usize].queue.is_some() {
            self.detach(node);
        }
        self.attach_front(queue, node);
    }

    /// Unlinks `marker`, if it is linked.
    pub fn marker_remove(&mut self, marker: MarkerId) {
        let node = self.marker_node(marker);
        if self.links[node as usize].queue.is_some() {
            self.detach(node);
        }
    }

    /// Queue `marker` is spliced into, if any.
    pub fn marker_queue(&self, marker: MarkerId) -> Option<QueueTag> {
        self.links[self.marker_node(marker) as usize].queue
    }

    /// First page after `marker`, skipping other markers.
    pub fn page_after_marker(&self, marker: MarkerId) -> Option<PageId> {
        let link = self.links[self.marker_node(marker) as usize];
        link.queue?;
        self.first_page_from(link.next)
    }

    /// Moves `marker` to sit directly after `page` on the page's queue.
    pub fn marker_move_after(&mut self, marker: MarkerId, page: PageId) {
        let node = self.marker_node(marker);
        let anchor = self.page_node(page);
        let Some(queue) = self.links[anchor as usize].queue else {
            return;
        };
        if self.links[node as usize].queue.is_some() {
            self.detach(node);
        }
        let next = self.links[anchor as usize].next;
        self.links[node as usize] = Link {
            prev: Some(anchor),
            next,
            queue: Some(queue),
        };
        self.links[anchor as usize].next = Some(node);
        match next {
            Some(next) => self.links[next as usize].prev = Some(node),
            None => self.ends[queue.slot()].tail = Some(node),
        }
    }

    #[inline]
    fn page_node(&self, page: PageId) -> u32 {
        self.markers + page.0
    }

    #[inline]
    fn marker_node(&self, marker: MarkerId) -> u32 {
        assert!(marker.0 < self.markers, "unknown marker {marker:?}");
        marker.0
    }

    #[inline]
    fn is_marker(&self, node: u32) -> bool {
        node < self.markers
    }

    fn first_page_from(&self, mut current: Option<u32>) -> Option<PageId> {
        while let Some(node) = current {
            if !self.is_marker(node) {
                return Some(PageId(node - self.markers));
            }
            current = self.links[node as usize].next;
        }
        None
    }

    fn detach(&mut self, node: u32) {
        let Link { prev, next, queue } = self.links[node as usize];
        let Some(queue) = queue else {
            return;
        };
        let ends = &mut self.ends[queue.slot()];
        match prev {
            Some(prev) => self.links[prev as usize].next = next,
            None => ends.head = next,
        }
        match next {
            Some(next) => self.links[next as usize].prev = prev,
            None => ends.tail = prev,
        }
        self.links[node as usize] = Link::default();
    }

    fn attach_back(&mut self, queue: QueueTag, node: u32) {
        let ends = &mut self.ends[queue.slot()];
        let old_tail = ends.tail;
        match old_tail {
            Some(tail) => self.links[tail as usize].next = Some(node),
            None => ends.head = Some(node),
        }
        ends.tail = Some(node);
        self.links[node as usize] = Link {
            prev: old_tail,
            next: None,
            queue: Some(queue),
        };
    }

    fn attach_front(&mut self, queue: QueueTag, node: u32) {
        let ends = &mut self.ends[queue.slot()];
        let old_head = ends.head;
        match old_head {
            Some(head) => self.links[head as usize].prev = Some(node),
            None => ends.tail = Some(node),
        }
        ends.head = Some(node);
        self.links[node as usize] = Link {
            prev: None,
            next: old_head,
            queue: Some(queue),
        };
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let mut seen = vec![false; self.links.len()];
        for (slot, ends) in self.ends.iter().enumerate() {
            let mut pages = 0usize;
            let mut prev = None;
            let mut current = ends.head;
            while let Some(node) = current {
                assert!(!seen[node as usize], "node {node} linked twice");
                seen[node as usize] = true;
                let link = self.links[node as usize];
                assert_eq!(link.prev, prev, "broken back link at node {node}");
                assert_eq!(
                    link.queue.map(QueueTag::slot),
                    Some(slot),
                    "node {node} tagged with the wrong queue"
                );
                if !self.is_marker(node) {
                    pages += 1;
                }
                prev = Some(node);
                current = link.next;
            }
            assert_eq!(ends.tail, prev, "tail mismatch on queue slot {slot}");
            assert_eq!(ends.len, pages, "length mismatch on queue slot {slot}");
        }
        for (node, link) in self.links.iter().enumerate() {
            if !seen[node] {
                assert!(link.queue.is_none(), "node {node} tagged but unreachable");
            }
        }
    }
}

/// Iterator over the pages of one queue, head to tail.
pub struct PageQueueIter<'a> {
    queues: &'a PageQueues,
    current: Option<u32>,
}

impl Iterator for PageQueueIter<'_> {
    type Item = PageId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.current?;
            self.current = self.queues.links[node as usize].next;
            if !self.queues.is_marker(node) {
                return Some(PageId(node - self.queues.markers));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(q: &PageQueues, tag: QueueTag) -> Vec<usize> {
        q.iter(tag).map(PageId::index).collect()
    }

    #[test]
    fn push_remove_move() {
        let mut q = PageQueues::new(4, 0);
        q.push_back(QueueTag::Active, PageId::new(0));
        q.push_back(QueueTag::Active, PageId::new(1));
        q.push_back(QueueTag::Inactive, PageId::new(2));
        assert_eq!(pages(&q, QueueTag::Active), vec![0, 1]);
        assert_eq!(q.len(QueueTag::Inactive), 1);
        assert_eq!(q.total_len(), 3);

        q.move_to_back(QueueTag::Inactive, PageId::new(0));
        assert_eq!(pages(&q, QueueTag::Active), vec![1]);
        assert_eq!(pages(&q, QueueTag::Inactive), vec![2, 0]);
        assert_eq!(q.queue_of(PageId::new(0)), Some(QueueTag::Inactive));

        assert_eq!(q.remove(PageId::new(2)), Some(QueueTag::Inactive));
        assert_eq!(q.remove(PageId::new(2)), None);
        assert_eq!(q.queue_of(PageId::new(2)), None);
        q.debug_validate_invariants();
    }

    #[test]
    #[should_panic(expected = "already on")]
    fn double_insert_panics() {
        let mut q = PageQueues::new(2, 0);
        q.push_back(QueueTag::Hot, PageId::new(1));
        q.push_back(QueueTag::Cold, PageId::new(1));
    }

    #[test]
    fn pop_front_is_fifo() {
        let mut q = PageQueues::new(3, 0);
        for i in [2, 0, 1] {
            q.push_back(QueueTag::New, PageId::new(i));
        }
        assert_eq!(q.pop_front(QueueTag::New), Some(PageId::new(2)));
        assert_eq!(q.pop_front(QueueTag::New), Some(PageId::new(0)));
        assert_eq!(q.pop_front(QueueTag::New), Some(PageId::new(1)));
        assert_eq!(q.pop_front(QueueTag::New), None);
        assert!(q.is_empty(QueueTag::New));
    }

    #[test]
    fn marker_survives_neighbour_removal() {
        let hand = MarkerId::new(0);
        let mut q = PageQueues::new(4, 1);
        for i in 0..4 {
            q.push_back(QueueTag::Inactive, PageId::new(i));
        }
        q.marker_insert_head(hand, QueueTag::Inactive);
        assert_eq!(q.page_after_marker(hand), Some(PageId::new(0)));

        q.marker_move_after(hand, PageId::new(0));
        q.marker_move_after(hand, PageId::new(1));
        // neighbours vanish while the hand is parked between them
        q.remove(PageId::new(1));
        q.remove(PageId::new(2));
        assert_eq!(q.page_after_marker(hand), Some(PageId::new(3)));
        assert_eq!(q.len(QueueTag::Inactive), 2);
        assert_eq!(pages(&q, QueueTag::Inactive), vec![0, 3]);
        q.debug_validate_invariants();

        q.marker_move_after(hand, PageId::new(3));
        assert_eq!(q.page_after_marker(hand), None);
        q.marker_remove(hand);
        assert_eq!(q.marker_queue(hand), None);
        q.debug_validate_invariants();
    }

    #[test]
    fn markers_are_invisible_to_front_and_pop() {
        let a = MarkerId::new(0);
        let b = MarkerId::new(1);
        let mut q = PageQueues::new(2, 2);
        q.marker_insert_head(a, QueueTag::Cold);
        q.marker_insert_head(b, QueueTag::Cold);
        assert_eq!(q.front(QueueTag::Cold), None);
        q.push_back(QueueTag::Cold, PageId::new(1));
        assert_eq!(q.front(QueueTag::Cold), Some(PageId::new(1)));
        assert_eq!(q.page_after_marker(b), Some(PageId::new(1)));
        assert_eq!(q.pop_front(QueueTag::Cold), Some(PageId::new(1)));
        assert_eq!(q.len(QueueTag::Cold), 0);
        q.debug_validate_invariants();
    }

    #[test]
    fn grow_keeps_links() {
        let mut q = PageQueues::new(1, 1);
        q.push_back(QueueTag::Hot, PageId::new(0));
        q.grow(8);
        assert_eq!(q.page_capacity(), 8);
        q.push_back(QueueTag::Hot, PageId::new(7));
        assert_eq!(pages(&q, QueueTag::Hot), vec![0, 7]);
        q.debug_validate_invariants();
    }
}
