//! Execution phases and the [`PhaseSet`] a unit declares.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::ParsePhaseError;

/// A named point in the outer simulation loop at which a subset of
/// units runs.
///
/// The built-in phases cover the usual transient-solve control points.
/// [`Phase::Custom`] carries an application-defined number and renders
/// as `custom:N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Once, before the first timestep.
    Initial,
    /// At the start of every timestep.
    TimestepBegin,
    /// At the end of every timestep.
    TimestepEnd,
    /// On every linear iteration.
    Linear,
    /// On every nonlinear iteration.
    Nonlinear,
    /// Once, after the last timestep.
    Final,
    /// Application-defined phase.
    Custom(u32),
}

impl Phase {
    /// Every built-in phase, in loop order. Excludes [`Phase::Custom`].
    pub const BUILTIN: [Phase; 6] = [
        Phase::Initial,
        Phase::TimestepBegin,
        Phase::TimestepEnd,
        Phase::Linear,
        Phase::Nonlinear,
        Phase::Final,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::TimestepBegin => write!(f, "timestep-begin"),
            Self::TimestepEnd => write!(f, "timestep-end"),
            Self::Linear => write!(f, "linear"),
            Self::Nonlinear => write!(f, "nonlinear"),
            Self::Final => write!(f, "final"),
            Self::Custom(n) => write!(f, "custom:{n}"),
        }
    }
}

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let phase = match s {
            "initial" => Self::Initial,
            "timestep-begin" => Self::TimestepBegin,
            "timestep-end" => Self::TimestepEnd,
            "linear" => Self::Linear,
            "nonlinear" => Self::Nonlinear,
            "final" => Self::Final,
            other => {
                let n = other
                    .strip_prefix("custom:")
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| ParsePhaseError {
                        input: s.to_string(),
                    })?;
                Self::Custom(n)
            }
        };
        Ok(phase)
    }
}

/// The set of phases a unit declares, kept sorted and free of duplicates.
///
/// Most units run in one or two phases, so the set lives inline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PhaseSet {
    phases: SmallVec<[Phase; 4]>,
}

impl PhaseSet {
    /// Create an empty phase set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Insert a phase. Returns `false` if it was already present.
    pub fn insert(&mut self, phase: Phase) -> bool {
        match self.phases.binary_search(&phase) {
            Ok(_) => false,
            Err(pos) => {
                self.phases.insert(pos, phase);
                true
            }
        }
    }

    /// Check whether the set contains a phase.
    pub fn contains(&self, phase: Phase) -> bool {
        self.phases.binary_search(&phase).is_ok()
    }

    /// Returns `true` if no phase is declared.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Number of declared phases.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Iterate over the phases in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().copied()
    }
}

impl FromIterator<Phase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        let mut set = Self::empty();
        for phase in iter {
            set.insert(phase);
        }
        set
    }
}
