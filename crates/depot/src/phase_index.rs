//! Partition of a registry by execution phase.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use depot_core::{Phase, ShardId, Unit};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::{ConfigError, CrossPhasePolicy, UnresolvedPolicy, WarehouseConfig};
use crate::error::RegistryError;
use crate::registry::ObjectRegistry;

/// An aggregate registry plus one sub-registry per declared phase.
///
/// A unit lands in the aggregate and in exactly the sub-registries of
/// its declared phases. Each phase is ordered using only its own units;
/// the aggregate is ordered over everything, which is where cycles that
/// span phases and requirements nothing provides are caught.
///
/// Querying a phase that no unit declares yields an empty registry with
/// the right shard count, so callers never special-case absent phases.
pub struct PhaseIndex<U: Unit + ?Sized = dyn Unit> {
    aggregate: ObjectRegistry<U>,
    phases: IndexMap<Phase, ObjectRegistry<U>>,
    empty: ObjectRegistry<U>,
    cross_phase: CrossPhasePolicy,
}

impl<U: Unit + ?Sized> fmt::Debug for PhaseIndex<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseIndex")
            .field("aggregate", &self.aggregate)
            .field("phases", &self.phases.keys().collect::<Vec<_>>())
            .field("cross_phase", &self.cross_phase)
            .finish()
    }
}

impl<U: Unit + ?Sized> PhaseIndex<U> {
    /// Create an index with `shard_count` shards and default policies.
    pub fn new(shard_count: usize) -> Self {
        Self::from_parts(
            ObjectRegistry::new(shard_count),
            CrossPhasePolicy::default(),
        )
    }

    /// Create an index from a validated configuration.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_parts(
            ObjectRegistry::from_config(config)?,
            config.cross_phase,
        ))
    }

    fn from_parts(aggregate: ObjectRegistry<U>, cross_phase: CrossPhasePolicy) -> Self {
        let mut empty = aggregate.empty_like();
        empty.prime_all();
        Self {
            aggregate,
            phases: IndexMap::new(),
            empty,
            cross_phase,
        }
    }

    /// Number of shards shared by every sub-registry.
    pub fn shard_count(&self) -> usize {
        self.aggregate.shard_count()
    }

    /// The registry holding every unit regardless of phase.
    pub fn aggregate(&self) -> &ObjectRegistry<U> {
        &self.aggregate
    }

    /// Phases that have a sub-registry, with the sub-registry, in the
    /// order they were first declared.
    pub fn phases(&self) -> impl Iterator<Item = (Phase, &ObjectRegistry<U>)> {
        self.phases.iter().map(|(&phase, registry)| (phase, registry))
    }

    // ── Setup ──────────────────────────────────────────────────

    /// Register a unit in the aggregate and in the sub-registry of each
    /// phase it declares.
    ///
    /// All or nothing: a unit the aggregate rejects reaches no phase.
    pub fn add(&mut self, unit: Arc<U>, shard: ShardId) -> Result<(), RegistryError> {
        // Phase sub-registries are only filled from here, so each holds a
        // subset of the aggregate and cannot reject what it accepted.
        self.aggregate.add(Arc::clone(&unit), shard)?;
        for phase in unit.declared_phases().iter() {
            self.get_or_create(phase).add(Arc::clone(&unit), shard)?;
        }
        Ok(())
    }

    /// Sub-registry for `phase`, created empty if absent.
    ///
    /// Phase sub-registries accept requirements they cannot satisfy
    /// locally; unresolved requirements are judged on the aggregate.
    fn get_or_create(&mut self, phase: Phase) -> &mut ObjectRegistry<U> {
        let shard_count = self.aggregate.shard_count();
        self.phases
            .entry(phase)
            .or_insert_with(|| ObjectRegistry::with_policy(shard_count, UnresolvedPolicy::Allow))
    }

    /// Refresh the aggregate and every phase sub-registry.
    pub fn refresh(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.aggregate.refresh(shard)?;
        for registry in self.phases.values_mut() {
            registry.refresh(shard)?;
        }
        Ok(())
    }

    /// [`refresh`](Self::refresh) every shard.
    pub fn refresh_all(&mut self) {
        self.aggregate.refresh_all();
        for registry in self.phases.values_mut() {
            registry.refresh_all();
        }
    }

    /// Sort the aggregate, check cross-phase requirements per
    /// [`CrossPhasePolicy`], then sort each phase independently.
    pub fn sort(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.aggregate.sort(shard)?;
        self.check_cross_phase(shard)?;
        for (phase, registry) in &mut self.phases {
            registry.sort(shard)?;
            debug!(%phase, %shard, "sorted phase");
        }
        Ok(())
    }

    /// [`sort`](Self::sort) every shard, stopping at the first error.
    pub fn sort_all(&mut self) -> Result<(), RegistryError> {
        for i in 0..self.shard_count() {
            self.sort(ShardId(i as u32))?;
        }
        Ok(())
    }

    /// Prime the aggregate and every phase sub-registry.
    pub fn prime(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.aggregate.prime(shard)?;
        for registry in self.phases.values_mut() {
            registry.prime(shard)?;
        }
        Ok(())
    }

    /// [`prime`](Self::prime) every shard.
    pub fn prime_all(&mut self) {
        self.aggregate.prime_all();
        for registry in self.phases.values_mut() {
            registry.prime_all();
        }
    }

    /// Remove every unit of a shard from the aggregate and every phase.
    pub fn clear(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.aggregate.clear(shard)?;
        for registry in self.phases.values_mut() {
            registry.clear(shard)?;
        }
        Ok(())
    }

    fn check_cross_phase(&self, shard: ShardId) -> Result<(), RegistryError> {
        if self.cross_phase == CrossPhasePolicy::Ignore {
            return Ok(());
        }
        let provided_anywhere: HashSet<String> = self
            .aggregate
            .shard(shard)?
            .active()
            .iter()
            .flat_map(|u| u.provides())
            .collect();

        for (&phase, registry) in &self.phases {
            let members = registry.shard(shard)?;
            let provided_here: HashSet<String> =
                members.active().iter().flat_map(|u| u.provides()).collect();
            for unit in members.active() {
                for requirement in unit.requires() {
                    if provided_here.contains(&requirement)
                        || !provided_anywhere.contains(&requirement)
                    {
                        continue;
                    }
                    if self.cross_phase == CrossPhasePolicy::Error {
                        return Err(RegistryError::CrossPhaseRequirement {
                            unit: unit.name().to_string(),
                            phase,
                            requirement,
                        });
                    }
                    warn!(
                        unit = unit.name(),
                        %phase,
                        %requirement,
                        %shard,
                        "requirement is provided only in other phases"
                    );
                }
            }
        }
        Ok(())
    }

    // ── Querying ───────────────────────────────────────────────

    /// Sub-registry for `phase`, or an empty primed registry if no unit
    /// declares it.
    pub fn query(&self, phase: Phase) -> &ObjectRegistry<U> {
        self.phases.get(&phase).unwrap_or(&self.empty)
    }

    /// Sub-registry for `phase`, if one exists.
    pub fn try_get(&self, phase: Phase) -> Option<&ObjectRegistry<U>> {
        self.phases.get(&phase)
    }

    /// Run the `on_phase` hook of every enabled unit of `shard` that
    /// declares `phase`, in that phase's order.
    pub fn dispatch(&self, phase: Phase, shard: ShardId) -> Result<usize, RegistryError> {
        self.query(phase).lifecycle_dispatch(phase, shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::RestrictionId;
    use depot_test_utils::{new_dispatch_log, MockUnit};

    const S: ShardId = ShardId(0);

    fn active_names<T: Unit + ?Sized>(registry: &ObjectRegistry<T>) -> Vec<String> {
        registry
            .shard(S)
            .unwrap()
            .active()
            .iter()
            .map(|u| u.name().to_string())
            .collect()
    }

    fn unit(name: &str, phases: &[Phase]) -> Arc<MockUnit> {
        Arc::new(MockUnit::new(name).phases(phases.iter().copied()))
    }

    #[test]
    fn units_land_in_declared_phases_only() {
        let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
        index
            .add(unit("a", &[Phase::Linear, Phase::Final]), S)
            .unwrap();
        index.add(unit("b", &[Phase::Linear]), S).unwrap();
        index.add(unit("c", &[]), S).unwrap();

        assert_eq!(active_names(index.aggregate()), vec!["a", "b", "c"]);
        assert_eq!(active_names(index.query(Phase::Linear)), vec!["a", "b"]);
        assert_eq!(active_names(index.query(Phase::Final)), vec!["a"]);
        assert!(index.try_get(Phase::Initial).is_none());
        assert_eq!(
            index.phases().map(|(p, _)| p).collect::<Vec<_>>(),
            vec![Phase::Linear, Phase::Final]
        );
    }

    #[test]
    fn undeclared_phase_is_empty_and_later_fills_in() {
        let custom: Phase = "custom:7".parse().unwrap();
        let mut index: PhaseIndex = PhaseIndex::new(2);

        let empty = index.query(custom);
        assert_eq!(empty.shard_count(), 2);
        assert!(empty.shard(ShardId(1)).unwrap().active().is_empty());
        assert_eq!(
            empty
                .try_active_for_restriction(RestrictionId(5), S)
                .map(|units| units.len()),
            Some(0)
        );
        assert_eq!(index.dispatch(custom, S).unwrap(), 0);

        index.add(unit("late", &[custom]), S).unwrap();
        index.refresh(S).unwrap();
        assert_eq!(active_names(index.query(custom)), vec!["late"]);
    }

    #[test]
    fn each_phase_sorts_on_its_own() {
        let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
        let consumer = MockUnit::new("consumer")
            .requiring(["field"])
            .phases([Phase::Linear]);
        let producer = MockUnit::new("producer")
            .providing(["field"])
            .phases([Phase::Linear, Phase::Nonlinear]);
        index.add(Arc::new(consumer), S).unwrap();
        index.add(Arc::new(producer), S).unwrap();
        index.sort(S).unwrap();

        assert_eq!(
            active_names(index.query(Phase::Linear)),
            vec!["producer", "consumer"]
        );
        assert_eq!(active_names(index.query(Phase::Nonlinear)), vec!["producer"]);
        assert_eq!(active_names(index.aggregate()), vec!["producer", "consumer"]);
    }

    #[test]
    fn cycle_across_phases_is_caught_by_aggregate() {
        let mut index: PhaseIndex = PhaseIndex::new(1);
        index
            .add(
                Arc::new(MockUnit::new("a").requiring(["b"]).phases([Phase::Initial])),
                S,
            )
            .unwrap();
        index
            .add(
                Arc::new(MockUnit::new("b").requiring(["a"]).phases([Phase::Final])),
                S,
            )
            .unwrap();
        let err = index.sort(S).unwrap_err();
        assert!(matches!(err, RegistryError::CyclicDependency(_)));
    }

    fn cross_phase_index(policy: CrossPhasePolicy) -> PhaseIndex {
        let config = WarehouseConfig {
            shard_count: Some(1),
            cross_phase: policy,
            ..WarehouseConfig::default()
        };
        let mut index: PhaseIndex = PhaseIndex::from_config(&config).unwrap();
        index
            .add(
                Arc::new(MockUnit::new("aux").providing(["u"]).phases([Phase::TimestepBegin])),
                S,
            )
            .unwrap();
        index
            .add(
                Arc::new(MockUnit::new("kernel").requiring(["u"]).phases([Phase::Linear])),
                S,
            )
            .unwrap();
        index
    }

    #[test]
    fn cross_phase_policy_error() {
        let mut index = cross_phase_index(CrossPhasePolicy::Error);
        assert_eq!(
            index.sort(S).unwrap_err(),
            RegistryError::CrossPhaseRequirement {
                unit: "kernel".into(),
                phase: Phase::Linear,
                requirement: "u".into(),
            }
        );
    }

    #[test]
    fn cross_phase_policy_warn_and_ignore_accept() {
        depot_test_utils::init_tracing();
        cross_phase_index(CrossPhasePolicy::Warn).sort(S).unwrap();
        cross_phase_index(CrossPhasePolicy::Ignore).sort(S).unwrap();
    }

    #[test]
    fn unresolved_is_judged_on_aggregate() {
        let config = WarehouseConfig {
            shard_count: Some(1),
            unresolved: UnresolvedPolicy::Error,
            cross_phase: CrossPhasePolicy::Ignore,
        };
        let mut strict: PhaseIndex = PhaseIndex::from_config(&config).unwrap();
        strict
            .add(
                Arc::new(MockUnit::new("aux").providing(["u"]).phases([Phase::TimestepBegin])),
                S,
            )
            .unwrap();
        strict
            .add(
                Arc::new(MockUnit::new("kernel").requiring(["u"]).phases([Phase::Linear])),
                S,
            )
            .unwrap();
        strict.sort(S).unwrap();

        strict
            .add(
                Arc::new(MockUnit::new("k").requiring(["missing"]).phases([Phase::Linear])),
                S,
            )
            .unwrap();
        assert!(matches!(
            strict.sort(S).unwrap_err(),
            RegistryError::UnresolvedRequirement { .. }
        ));
    }

    #[test]
    fn dispatch_uses_phase_order() {
        let log = new_dispatch_log();
        let mut index: PhaseIndex = PhaseIndex::new(1);
        index
            .add(
                Arc::new(
                    MockUnit::new("second")
                        .requiring(["first"])
                        .phases([Phase::Nonlinear])
                        .logging_to(&log),
                ),
                S,
            )
            .unwrap();
        index
            .add(
                Arc::new(
                    MockUnit::new("first")
                        .phases([Phase::Nonlinear, Phase::Final])
                        .logging_to(&log),
                ),
                S,
            )
            .unwrap();
        index.sort(S).unwrap();

        assert_eq!(index.dispatch(Phase::Nonlinear, S).unwrap(), 2);
        assert_eq!(index.dispatch(Phase::Final, S).unwrap(), 1);
        let calls = log.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("first".to_string(), Phase::Nonlinear),
                ("second".to_string(), Phase::Nonlinear),
                ("first".to_string(), Phase::Final),
            ]
        );
    }

    #[test]
    fn refresh_cascades_to_phases() {
        let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
        let toggled = unit("toggled", &[Phase::Linear]);
        index.add(Arc::clone(&toggled), S).unwrap();
        index.add(unit("steady", &[Phase::Linear]), S).unwrap();

        toggled.set_enabled(false);
        index.refresh(S).unwrap();
        assert_eq!(active_names(index.aggregate()), vec!["steady"]);
        assert_eq!(active_names(index.query(Phase::Linear)), vec!["steady"]);
    }

    #[test]
    fn rejected_add_reaches_no_phase() {
        let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
        index.add(unit("k", &[Phase::Linear]), S).unwrap();

        let err = index
            .add(unit("k", &[Phase::Linear, Phase::Final]), S)
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(active_names(index.aggregate()), vec!["k"]);
        assert_eq!(active_names(index.query(Phase::Linear)), vec!["k"]);
        assert!(index.try_get(Phase::Final).is_none());

        let malformed = index.add(unit("", &[Phase::Initial]), S).unwrap_err();
        assert!(malformed.is_configuration());
        assert!(index.try_get(Phase::Initial).is_none());
        assert_eq!(index.aggregate().shard(S).unwrap().len(), 1);
    }

    #[test]
    fn out_of_range_shard_leaves_phases_untouched() {
        let mut index: PhaseIndex = PhaseIndex::new(1);
        let err = index.add(unit("a", &[Phase::Linear]), ShardId(3)).unwrap_err();
        assert!(err.is_configuration());
        assert!(index.try_get(Phase::Linear).is_none());
    }
}
