//! pagesim: trace-driven simulation harness for the pagekit eviction engine.
//!
//! A [`Universe`] of frames plays the page owner, a [`Trace`] supplies
//! accesses, and the [`Simulator`] turns misses into faults and runs the
//! page daemon when frames run short.

pub mod error;
pub mod report;
pub mod scenarios;
pub mod simulator;
pub mod trace;
pub mod universe;

pub use error::SimError;
pub use report::{EngineCounters, PhaseReport, SimReport};
pub use simulator::{SimConfig, Simulator};
pub use trace::{Phase, Trace};
pub use universe::Universe;
