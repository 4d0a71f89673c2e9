//! Canned workloads.
//!
//! | Name         | Frames | Trace                                            |
//! |--------------|--------|--------------------------------------------------|
//! | `uniform`    | 256    | uniform random over 1024 keys                    |
//! | `scan`       | 512    | 256-key working set, 8192-key scan, working set  |
//! | `readahead`  | 256    | sequential 4096 keys with 7 pages of read-ahead  |

use pagekit::config::PolicyKind;

use crate::simulator::SimConfig;
use crate::trace::Trace;

pub const UNIFORM_FRAMES: usize = 256;
pub const UNIFORM_KEYS: u64 = 1024;

pub const SCAN_FRAMES: usize = 512;
pub const SCAN_WORKING_SET: usize = 256;
pub const SCAN_LENGTH: usize = 8192;
/// First key of the one-time scan, clear of the working set.
pub const SCAN_START: u64 = 1 << 20;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub config: SimConfig,
    pub trace: Trace,
}

pub const NAMES: [&str; 3] = ["uniform", "scan", "readahead"];

/// Uniform random faulting; phases `warm` and `steady`.
pub fn uniform(kind: PolicyKind, seed: u64) -> Scenario {
    let trace = Trace::uniform("warm", UNIFORM_KEYS, 20_000, seed)
        .then(Trace::uniform("steady", UNIFORM_KEYS, 50_000, seed ^ 0x5EED));
    Scenario {
        name: "uniform",
        config: SimConfig::new(kind, UNIFORM_FRAMES),
        trace,
    }
}

/// Working set, one large scan, then one pass back over the working set;
/// phases `warm`, `scan` and `return`.
pub fn scan_resistance(kind: PolicyKind) -> Scenario {
    let trace = Trace::working_set("warm", 0, SCAN_WORKING_SET, 20)
        .then(Trace::sequential("scan", SCAN_START, SCAN_LENGTH))
        .then(Trace::working_set("return", 0, SCAN_WORKING_SET, 1));
    Scenario {
        name: "scan",
        config: SimConfig::new(kind, SCAN_FRAMES),
        trace,
    }
}

/// Streaming read with read-ahead; phase `stream`.
pub fn read_ahead(kind: PolicyKind) -> Scenario {
    let mut config = SimConfig::new(kind, 256);
    config.read_ahead = 7;
    Scenario {
        name: "readahead",
        config,
        trace: Trace::sequential("stream", 0, 4096),
    }
}

pub fn by_name(name: &str, kind: PolicyKind) -> Option<Scenario> {
    match name {
        "uniform" => Some(uniform(kind, 42)),
        "scan" => Some(scan_resistance(kind)),
        "readahead" => Some(read_ahead(kind)),
        _ => None,
    }
}
