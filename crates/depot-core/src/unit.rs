//! The [`Unit`] trait implemented by every schedulable object.
//!
//! A unit is a physics kernel, boundary condition, auxiliary computation
//! or user object. The registry never owns the numerical content; it
//! only asks a unit where, when and after whom it must run.

use crate::error::UnitError;
use crate::phase::{Phase, PhaseSet};
use crate::restriction::RestrictionSet;
use crate::tag::TagSet;

/// A computational unit managed by a registry.
///
/// Only [`name`](Unit::name) is mandatory. Every other method is an
/// optional capability with a neutral default, so a unit that has no
/// phases, no dependencies, no tags or no geometric restriction simply
/// does not override the corresponding method.
///
/// # Contract
///
/// - `name()` is stable for the lifetime of the unit.
/// - `declared_phases()`, `requires()`, `provides()`, `declared_tags()`
///   and `restriction()` are read during setup (registration, refresh,
///   sort, cache population), never inside the compute loop.
/// - `is_enabled()` is re-evaluated on every refresh.
/// - `on_phase()` takes `&self`; units needing per-phase state keep it
///   behind their own interior mutability.
///
/// # Examples
///
/// ```
/// use depot_core::{Phase, PhaseSet, Unit};
///
/// struct Convection;
///
/// impl Unit for Convection {
///     fn name(&self) -> &str { "convection" }
///
///     fn declared_phases(&self) -> PhaseSet {
///         [Phase::Linear, Phase::Nonlinear].into_iter().collect()
///     }
///
///     fn requires(&self) -> Vec<String> {
///         vec!["velocity".into()]
///     }
/// }
///
/// let unit = Convection;
/// assert_eq!(unit.provides(), vec!["convection".to_string()]);
/// assert!(unit.restriction().is_universal());
/// ```
pub trait Unit: Send + Sync {
    /// Stable, human-readable name used for lookups and diagnostics.
    fn name(&self) -> &str;

    /// Whether the unit currently participates in execution.
    ///
    /// Default: always enabled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Phases of the outer loop in which the unit runs.
    ///
    /// Default: none. Such a unit lives only in the aggregate registry.
    fn declared_phases(&self) -> PhaseSet {
        PhaseSet::empty()
    }

    /// Names this unit needs computed before it runs.
    ///
    /// Default: nothing.
    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    /// Names this unit makes available to later units.
    ///
    /// Default: the unit's own name.
    fn provides(&self) -> Vec<String> {
        vec![self.name().to_string()]
    }

    /// Output accumulators this unit contributes to.
    ///
    /// Default: none.
    fn declared_tags(&self) -> TagSet {
        TagSet::empty()
    }

    /// Domains on which the unit is active.
    ///
    /// Default: [`RestrictionSet::Universal`].
    fn restriction(&self) -> RestrictionSet {
        RestrictionSet::Universal
    }

    /// Lifecycle hook invoked by phase dispatch.
    ///
    /// Default: no-op.
    fn on_phase(&self, _phase: Phase) {}
}

/// Check the structural invariants a unit must satisfy to be registered.
///
/// Name uniqueness is a per-shard property and is checked by the
/// registry, not here.
pub fn validate_unit<U: Unit + ?Sized>(unit: &U) -> Result<(), UnitError> {
    let name = unit.name();
    if name.is_empty() {
        return Err(UnitError::EmptyName);
    }
    if let RestrictionSet::Only(ids) = unit.restriction() {
        if ids.is_empty() {
            return Err(UnitError::EmptyRestriction {
                unit: name.to_string(),
            });
        }
    }
    let provides = unit.provides();
    if provides.is_empty() {
        return Err(UnitError::ProvidesNothing {
            unit: name.to_string(),
        });
    }
    let empty_dependency = unit
        .requires()
        .iter()
        .chain(provides.iter())
        .any(|dep| dep.is_empty());
    if empty_dependency {
        return Err(UnitError::EmptyDependencyName {
            unit: name.to_string(),
        });
    }
    Ok(())
}
