//! pagekit: page-cache eviction policy engine.
//!
//! CLOCK and CLOCK-Pro replacement over a fixed page arena, with per-page
//! intents batched through per-CPU rings and an adaptive per-class tuner.
//! The `pagesim` workspace crate drives the engine against synthetic traces.

pub mod builder;
pub mod config;
pub mod ds;
pub mod engine;
pub mod error;
pub mod page;
pub mod policy;
pub mod tuner;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod traits;
