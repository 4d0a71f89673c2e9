pub use crate::builder::EngineBuilder;
pub use crate::config::{ClassLimits, PolicyConfig, PolicyKind};
pub use crate::engine::{EvictionEngine, PageGuard};
pub use crate::error::{ConfigError, InvariantError};
#[cfg(feature = "metrics")]
pub use crate::metrics::PolicyMetricsSnapshot;
pub use crate::page::{Intent, ObjectId, PageClass, PageId, PageIdentity, QueueTag};
pub use crate::policy::Verdict;
pub use crate::traits::PageOwner;
