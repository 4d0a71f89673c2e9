//! Simulator errors.

use std::fmt;

use pagekit::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Engine configuration was rejected.
    Config(ConfigError),
    /// No frame could be freed for a fault.
    NoVictim { accesses: u64 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(err) => write!(f, "invalid engine configuration: {err}"),
            SimError::NoVictim { accesses } => {
                write!(f, "no reclaimable frame after {accesses} accesses")
            }
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Config(err) => Some(err),
            SimError::NoVictim { .. } => None,
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(err: ConfigError) -> Self {
        SimError::Config(err)
    }
}
