pub mod nonresident;
pub mod page_queue;
pub mod pending_ring;

pub use nonresident::NonResidentTable;
pub use page_queue::{MarkerId, PageQueueIter, PageQueues};
pub use pending_ring::{PendingRing, PendingRings};
