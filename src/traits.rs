//! # Collaborator Interface
//!
//! The engine ranks pages; it never owns them. Everything it needs to know
//! about a page beyond its own flag word comes through [`PageOwner`],
//! implemented by whoever owns the page records (a VM system, a buffer
//! cache, or the `pagesim` simulator).
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────┐        ┌──────────────────────────────┐
//!   │   EvictionEngine<O>      │        │        O: PageOwner          │
//!   │                          │        │                              │
//!   │  scanner ── try_lock ────┼───────►│  try_lock_owner → Token      │
//!   │          ── ref bit ─────┼───────►│  test_and_clear_reference    │
//!   │  balance ── drop swap ───┼───────►│  try_drop_swap               │
//!   │  insert  ── identity ────┼───────►│  identity → PageIdentity     │
//!   │  tune    ── free pages ──┼───────►│  free_pages / free_target    │
//!   └──────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! ## Locking Protocol
//!
//! | Call                       | Global lock held | Owner lock held |
//! |----------------------------|------------------|-----------------|
//! | `try_lock_owner`           | no               | no              |
//! | `test_and_clear_reference` | either           | either          |
//! | `try_drop_swap`            | no               | yes             |
//! | `identity`                 | yes              | no              |
//! | `free_pages`/`free_target` | no               | no              |
//!
//! Both the scanner and the balance pass release the global lock before
//! taking an owner lock and re-validate the page afterwards.

use std::sync::Arc;

use crate::page::{PageId, PageIdentity};

/// Owner of the page records the engine ranks.
pub trait PageOwner: Send + Sync {
    /// Proof that the page's owning object is locked. Dropping it unlocks.
    type Token;

    /// Tries to lock the object owning `page` without blocking.
    fn try_lock_owner(&self, page: PageId) -> Option<Self::Token>;

    /// Tests and clears the page's hardware reference bit.
    fn test_and_clear_reference(&self, page: PageId) -> bool;

    /// Drops the page's swap backing. Called with the owner lock held.
    fn try_drop_swap(&self, page: PageId) -> bool;

    /// Identity of the page, read when the page enters the engine.
    fn identity(&self, page: PageId) -> PageIdentity;

    /// Frames currently free.
    fn free_pages(&self) -> usize;

    /// Frames the page daemon tries to keep free.
    fn free_target(&self) -> usize;
}

impl<T: PageOwner + ?Sized> PageOwner for Arc<T> {
    type Token = T::Token;

    #[inline]
    fn try_lock_owner(&self, page: PageId) -> Option<Self::Token> {
        (**self).try_lock_owner(page)
    }

    #[inline]
    fn test_and_clear_reference(&self, page: PageId) -> bool {
        (**self).test_and_clear_reference(page)
    }

    #[inline]
    fn try_drop_swap(&self, page: PageId) -> bool {
        (**self).try_drop_swap(page)
    }

    #[inline]
    fn identity(&self, page: PageId) -> PageIdentity {
        (**self).identity(page)
    }

    #[inline]
    fn free_pages(&self) -> usize {
        (**self).free_pages()
    }

    #[inline]
    fn free_target(&self) -> usize {
        (**self).free_target()
    }
}

/// Object-safe view of a [`PageOwner`] used by the policies.
///
/// Policies run under the global lock, so they only get the calls that are
/// legal there; owner locking stays in the engine.
pub trait PageProbe {
    fn test_and_clear_reference(&self, page: PageId) -> bool;
    fn identity(&self, page: PageId) -> PageIdentity;
}

impl<O: PageOwner> PageProbe for O {
    #[inline]
    fn test_and_clear_reference(&self, page: PageId) -> bool {
        PageOwner::test_and_clear_reference(self, page)
    }

    #[inline]
    fn identity(&self, page: PageId) -> PageIdentity {
        PageOwner::identity(self, page)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::page::{ObjectId, PageClass};

    struct OnePage {
        referenced: AtomicBool,
        locked: AtomicBool,
    }

    impl PageOwner for OnePage {
        type Token = ();

        fn try_lock_owner(&self, _: PageId) -> Option<()> {
            (!self.locked.load(Ordering::Relaxed)).then_some(())
        }
        fn test_and_clear_reference(&self, _: PageId) -> bool {
            self.referenced.swap(false, Ordering::Relaxed)
        }
        fn try_drop_swap(&self, _: PageId) -> bool {
            true
        }
        fn identity(&self, page: PageId) -> PageIdentity {
            PageIdentity::new(ObjectId(1), page.index() as u64, PageClass::Exec)
        }
        fn free_pages(&self) -> usize {
            3
        }
        fn free_target(&self) -> usize {
            2
        }
    }

    #[test]
    fn arc_forwards_to_inner() {
        let owner = Arc::new(OnePage {
            referenced: AtomicBool::new(true),
            locked: AtomicBool::new(false),
        });
        assert!(PageOwner::test_and_clear_reference(&owner, PageId::new(0)));
        assert!(!PageOwner::test_and_clear_reference(&owner, PageId::new(0)));
        assert_eq!(owner.free_pages(), 3);
        assert_eq!(PageOwner::identity(&owner, PageId::new(9)).index, 9);
    }

    #[test]
    fn probe_view_forwards_to_owner() {
        let owner = OnePage {
            referenced: AtomicBool::new(true),
            locked: AtomicBool::new(true),
        };
        assert!(owner.try_lock_owner(PageId::new(0)).is_none());
        let probe: &dyn PageProbe = &owner;
        assert!(probe.test_and_clear_reference(PageId::new(0)));
        assert!(!probe.test_and_clear_reference(PageId::new(0)));
        assert_eq!(probe.identity(PageId::new(4)).class, PageClass::Exec);
    }
}
