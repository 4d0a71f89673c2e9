//! Error types for the pagekit library.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned by [`EvictionEngine::check_invariants`]
//!   when queue linkage, flag words or counters disagree.
//! - [`ConfigError`]: Returned when engine configuration is invalid
//!   (zero pages, out-of-range percentages, inverted class limits).
//!
//! The engine has no fallible steady-state operations: once `init` succeeds,
//! intents, realization and scanning cannot fail. Everything that can go
//! wrong is caught here, up front.
//!
//! ## Example Usage
//!
//! ```
//! use pagekit::config::PolicyConfig;
//! use pagekit::error::ConfigError;
//!
//! let mut config = PolicyConfig::default();
//! config.ncpu = 0;
//! let err: ConfigError = config.validate().unwrap_err();
//! assert!(err.to_string().contains("ncpu"));
//! ```
//!
//! [`EvictionEngine::check_invariants`]: crate::engine::EvictionEngine::check_invariants

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when engine invariants are violated.
///
/// Carries a human-readable description of the first invariant that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when engine configuration parameters are invalid.
///
/// Produced by [`PolicyConfig::validate`](crate::config::PolicyConfig::validate),
/// [`EvictionEngine::init`](crate::engine::EvictionEngine::init) and
/// [`EngineBuilder::try_build`](crate::builder::EngineBuilder::try_build).
///
/// # Example
///
/// ```
/// use pagekit::builder::EngineBuilder;
/// use pagekit::config::PolicyKind;
/// # use pagekit::page::{PageId, PageIdentity, ObjectId, PageClass};
/// # use pagekit::traits::PageOwner;
/// # struct Nobody;
/// # impl PageOwner for Nobody {
/// #     type Token = ();
/// #     fn try_lock_owner(&self, _: PageId) -> Option<()> { None }
/// #     fn test_and_clear_reference(&self, _: PageId) -> bool { false }
/// #     fn try_drop_swap(&self, _: PageId) -> bool { false }
/// #     fn identity(&self, p: PageId) -> PageIdentity {
/// #         PageIdentity::new(ObjectId(0), p.index() as u64, PageClass::Anon)
/// #     }
/// #     fn free_pages(&self) -> usize { 0 }
/// #     fn free_target(&self) -> usize { 0 }
/// # }
///
/// let err = EngineBuilder::new(PolicyKind::Clock, 0)
///     .try_build(Nobody)
///     .unwrap_err();
/// assert!(err.to_string().contains("total_pages"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
