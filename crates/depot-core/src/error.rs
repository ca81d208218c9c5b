//! Error types for unit validation and phase parsing.

use std::error::Error;
use std::fmt;

/// A unit failed validation at registration time.
///
/// Raised synchronously by `add()`; fatal to setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitError {
    /// The unit's name is empty.
    EmptyName,
    /// Another unit with the same name is already registered in the shard.
    DuplicateName {
        /// The contested name.
        name: String,
    },
    /// The unit is restricted to an explicit, empty list of domains,
    /// so it could never run.
    EmptyRestriction {
        /// Which unit.
        unit: String,
    },
    /// The unit declares an empty string in its requires or provides list.
    EmptyDependencyName {
        /// Which unit.
        unit: String,
    },
    /// The unit overrides `provides` with an empty list.
    ProvidesNothing {
        /// Which unit.
        unit: String,
    },
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "unit name is empty"),
            Self::DuplicateName { name } => {
                write!(f, "a unit named '{name}' is already registered")
            }
            Self::EmptyRestriction { unit } => {
                write!(f, "unit '{unit}' is restricted to an empty domain list")
            }
            Self::EmptyDependencyName { unit } => {
                write!(f, "unit '{unit}' declares an empty dependency name")
            }
            Self::ProvidesNothing { unit } => write!(f, "unit '{unit}' provides nothing"),
        }
    }
}

impl Error for UnitError {}

/// A string did not name a known [`Phase`](crate::Phase).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsePhaseError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParsePhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown phase '{}' (expected a built-in phase or custom:N)",
            self.input
        )
    }
}

impl Error for ParsePhaseError {}
