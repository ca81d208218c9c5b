//! Setup-time errors raised by registries and their indices.
//!
//! Every variant surfaces during registration, refresh or sort. The
//! read-only query API used by workers has no error paths.

use std::error::Error;
use std::fmt;

use depot_core::{Phase, ShardId, UnitError};
use depot_resolve::CyclicDependencyError;

/// Errors from registry setup operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A malformed unit was registered.
    Configuration(UnitError),
    /// Sorting found a dependency cycle.
    CyclicDependency(CyclicDependencyError),
    /// A shard id outside `0..shard_count`.
    UnknownShard {
        /// The rejected id.
        shard: ShardId,
        /// Number of shards the registry was built with.
        shard_count: usize,
    },
    /// A unit requires a name no unit in the shard provides, under
    /// [`UnresolvedPolicy::Error`](crate::UnresolvedPolicy::Error).
    UnresolvedRequirement {
        /// The requiring unit.
        unit: String,
        /// The missing name.
        requirement: String,
    },
    /// A unit requires a name that only units outside its phase provide,
    /// under [`CrossPhasePolicy::Error`](crate::CrossPhasePolicy::Error).
    CrossPhaseRequirement {
        /// The requiring unit.
        unit: String,
        /// The phase in which the requirement goes unmet.
        phase: Phase,
        /// The name provided only in other phases.
        requirement: String,
    },
}

impl RegistryError {
    /// Whether this error reports bad registration input rather than an
    /// ordering problem. Shard ids out of range count as configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnknownShard { .. })
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration: {e}"),
            Self::CyclicDependency(e) => write!(f, "{e}"),
            Self::UnknownShard { shard, shard_count } => {
                write!(
                    f,
                    "shard {shard} out of range (registry has {shard_count} shards)"
                )
            }
            Self::UnresolvedRequirement { unit, requirement } => {
                write!(
                    f,
                    "unit '{unit}' requires '{requirement}', which nothing provides"
                )
            }
            Self::CrossPhaseRequirement {
                unit,
                phase,
                requirement,
            } => {
                write!(
                    f,
                    "unit '{unit}' requires '{requirement}' in phase {phase}, \
                     but it is only provided in other phases"
                )
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::CyclicDependency(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UnitError> for RegistryError {
    fn from(e: UnitError) -> Self {
        Self::Configuration(e)
    }
}

impl From<CyclicDependencyError> for RegistryError {
    fn from(e: CyclicDependencyError) -> Self {
        Self::CyclicDependency(e)
    }
}
