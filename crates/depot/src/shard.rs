//! Per-worker storage: the all-list, the active-list, and the
//! restriction caches built over both.
//!
//! A [`Shard`] is mutated only through its owning
//! [`ObjectRegistry`](crate::ObjectRegistry). Workers read it through
//! `&Shard`, which exposes no mutating method.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use depot_core::{validate_unit, Phase, RestrictionId, Unit, UnitError};
use depot_resolve::{sort_by_dependencies, CyclicDependencyError, ResolvedOrder};
use indexmap::IndexMap;

/// Where a shard is in its setup/compute lifecycle.
///
/// ```text
/// Empty -> Registering -> Built -> Querying
///              ^                      |
///              +------ add/refresh ---+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardState {
    /// Nothing registered yet.
    Empty,
    /// Units added since the last refresh or sort.
    Registering,
    /// Active-list rebuilt; caches may be incomplete.
    Built,
    /// Every cache populated; reads never mutate.
    Querying,
}

/// One worker's partition of a registry.
pub struct Shard<U: Unit + ?Sized> {
    /// Every registered unit. Insertion order, re-threaded by `sort`.
    all: Vec<Arc<U>>,
    /// Unit name to index in `all`.
    names: IndexMap<String, usize>,
    /// Enabled subset of `all`, order-preserving.
    active: Vec<Arc<U>>,
    /// Restriction views over `active`.
    active_views: RestrictionViews<U>,
    /// Restriction views over `all`, disabled units included.
    all_views: RestrictionViews<U>,
    state: ShardState,
    sorted: bool,
}

impl<U: Unit + ?Sized> Default for Shard<U> {
    fn default() -> Self {
        Self {
            all: Vec::new(),
            names: IndexMap::new(),
            active: Vec::new(),
            active_views: RestrictionViews::default(),
            all_views: RestrictionViews::default(),
            state: ShardState::Empty,
            sorted: false,
        }
    }
}

impl<U: Unit + ?Sized> fmt::Debug for Shard<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("state", &self.state)
            .field("sorted", &self.sorted)
            .field("all", &self.names.keys().collect::<Vec<_>>())
            .field(
                "active",
                &self.active.iter().map(|u| u.name()).collect::<Vec<_>>(),
            )
            .field("cached_restrictions", &self.active_views.by_id.len())
            .finish()
    }
}

fn accepting<U: Unit + ?Sized>(units: &[Arc<U>], id: RestrictionId) -> Vec<Arc<U>> {
    units
        .iter()
        .filter(|u| u.restriction().accepts(id))
        .cloned()
        .collect()
}

/// Per-restriction filtered copies of one unit list.
struct RestrictionViews<U: Unit + ?Sized> {
    by_id: IndexMap<RestrictionId, Vec<Arc<U>>>,
    /// Universal units of the list. `Some` once primed.
    universal: Option<Vec<Arc<U>>>,
}

impl<U: Unit + ?Sized> Default for RestrictionViews<U> {
    fn default() -> Self {
        Self {
            by_id: IndexMap::new(),
            universal: None,
        }
    }
}

impl<U: Unit + ?Sized> RestrictionViews<U> {
    fn get(&self, id: RestrictionId) -> Option<&[Arc<U>]> {
        self.by_id
            .get(&id)
            .map(Vec::as_slice)
            .or(self.universal.as_deref())
    }

    fn get_or_insert(&mut self, source: &[Arc<U>], id: RestrictionId) -> &[Arc<U>] {
        self.by_id
            .entry(id)
            .or_insert_with(|| accepting(source, id))
            .as_slice()
    }

    fn prime(&mut self, source: &[Arc<U>]) {
        let ids: BTreeSet<RestrictionId> = source
            .iter()
            .flat_map(|u| u.restriction().ids().to_vec())
            .collect();
        for id in ids {
            self.by_id.entry(id).or_insert_with(|| accepting(source, id));
        }
        self.universal = Some(
            source
                .iter()
                .filter(|u| u.restriction().is_universal())
                .cloned()
                .collect(),
        );
    }

    fn clear(&mut self) {
        self.by_id.clear();
        self.universal = None;
    }
}

impl<U: Unit + ?Sized> Shard<U> {
    // ── Reads ──────────────────────────────────────────────────

    /// Every registered unit, enabled or not.
    pub fn all(&self) -> &[Arc<U>] {
        &self.all
    }

    /// Enabled units in execution order.
    pub fn active(&self) -> &[Arc<U>] {
        &self.active
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether no unit is registered.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Number of enabled units.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Whether at least one unit is enabled.
    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShardState {
        self.state
    }

    /// Whether the active-list is in resolved dependency order.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Look up a registered unit by name.
    pub fn unit(&self, name: &str) -> Option<&Arc<U>> {
        self.names.get(name).map(|&i| &self.all[i])
    }

    /// Look up an enabled unit by name.
    pub fn active_unit(&self, name: &str) -> Option<&Arc<U>> {
        self.active.iter().find(|u| u.name() == name)
    }

    /// Whether an enabled unit with this name exists.
    pub fn has_active_unit(&self, name: &str) -> bool {
        self.active_unit(name).is_some()
    }

    /// Cached restriction view, without populating anything.
    ///
    /// Returns `None` only when `id` has not been queried through
    /// [`ObjectRegistry::active_for_restriction`](crate::ObjectRegistry::active_for_restriction)
    /// and the shard has not been primed. Once primed, every id resolves:
    /// ids no unit names see exactly the universal units.
    pub fn cached_for_restriction(&self, id: RestrictionId) -> Option<&[Arc<U>]> {
        self.active_views.get(id)
    }

    /// Cached view of every registered unit running on `id`, disabled
    /// units included, in all-list order. Same population rules as
    /// [`cached_for_restriction`](Self::cached_for_restriction).
    pub fn cached_all_for_restriction(&self, id: RestrictionId) -> Option<&[Arc<U>]> {
        self.all_views.get(id)
    }

    /// Whether any enabled unit runs on `id`.
    pub fn has_active_for_restriction(&self, id: RestrictionId) -> bool {
        self.active.iter().any(|u| u.restriction().accepts(id))
    }

    /// Whether any registered unit runs on `id`, enabled or not.
    pub fn has_for_restriction(&self, id: RestrictionId) -> bool {
        self.all.iter().any(|u| u.restriction().accepts(id))
    }

    /// Every restriction id named by an enabled unit.
    pub fn active_restrictions(&self) -> BTreeSet<RestrictionId> {
        self.active
            .iter()
            .flat_map(|u| u.restriction().ids().to_vec())
            .collect()
    }

    /// Union of everything the enabled units require.
    pub fn collect_requires(&self) -> BTreeSet<String> {
        self.active.iter().flat_map(|u| u.requires()).collect()
    }

    /// Union of everything the enabled units running on `id` require.
    pub fn collect_requires_for_restriction(&self, id: RestrictionId) -> BTreeSet<String> {
        self.active
            .iter()
            .filter(|u| u.restriction().accepts(id))
            .flat_map(|u| u.requires())
            .collect()
    }

    /// One-line listing of enabled unit names for console diagnostics.
    pub fn describe_active(&self, prefix: &str) -> String {
        let names: Vec<&str> = self.active.iter().map(|u| u.name()).collect();
        format!("{prefix} {}", names.join(" "))
    }

    /// Invoke `on_phase` on every enabled unit declaring `phase`, in
    /// active-list order. Returns how many units ran.
    pub fn dispatch(&self, phase: Phase) -> usize {
        let mut ran = 0;
        for unit in &self.active {
            if unit.declared_phases().contains(phase) {
                unit.on_phase(phase);
                ran += 1;
            }
        }
        ran
    }

    // ── Mutation (registry only) ───────────────────────────────

    pub(crate) fn push(&mut self, unit: Arc<U>) -> Result<(), UnitError> {
        validate_unit(&*unit)?;
        if self.names.contains_key(unit.name()) {
            return Err(UnitError::DuplicateName {
                name: unit.name().to_string(),
            });
        }
        self.names.insert(unit.name().to_string(), self.all.len());
        if unit.is_enabled() {
            self.active.push(Arc::clone(&unit));
        }
        self.all.push(unit);
        self.invalidate_caches();
        self.sorted = false;
        self.state = ShardState::Registering;
        Ok(())
    }

    pub(crate) fn refresh(&mut self) {
        let previous = std::mem::take(&mut self.active);
        self.active = self.all.iter().filter(|u| u.is_enabled()).cloned().collect();
        // `all` carries the last sorted order, so an unchanged member
        // set is still sorted.
        self.sorted = self.sorted
            && previous.len() == self.active.len()
            && previous
                .iter()
                .zip(&self.active)
                .all(|(a, b)| Arc::ptr_eq(a, b));
        self.invalidate_caches();
        self.state = ShardState::Built;
    }

    pub(crate) fn sort(&mut self) -> Result<ResolvedOrder, CyclicDependencyError> {
        let resolved = sort_by_dependencies(&mut self.active)?;

        // Active units take the slots they held in `all` in resolved
        // order; disabled units keep their slots.
        let rethreaded: Vec<Arc<U>> = {
            let members: HashSet<&str> = self.active.iter().map(|u| u.name()).collect();
            let mut order = self.active.iter();
            self.all
                .iter()
                .map(|u| {
                    if members.contains(u.name()) {
                        order.next().unwrap_or(u).clone()
                    } else {
                        Arc::clone(u)
                    }
                })
                .collect()
        };
        self.all = rethreaded;
        self.reindex();

        self.invalidate_caches();
        self.sorted = true;
        self.state = ShardState::Built;
        Ok(resolved)
    }

    /// Mark the active-list as already in dependency order, for lists
    /// copied member by member out of a sorted shard.
    pub(crate) fn mark_sorted(&mut self) {
        self.sorted = true;
    }

    pub(crate) fn restricted_or_insert(&mut self, id: RestrictionId) -> &[Arc<U>] {
        self.active_views.get_or_insert(&self.active, id)
    }

    pub(crate) fn all_restricted_or_insert(&mut self, id: RestrictionId) -> &[Arc<U>] {
        self.all_views.get_or_insert(&self.all, id)
    }

    pub(crate) fn prime(&mut self) {
        self.active_views.prime(&self.active);
        self.all_views.prime(&self.all);
        self.state = ShardState::Querying;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    fn invalidate_caches(&mut self) {
        self.active_views.clear();
        self.all_views.clear();
    }

    fn reindex(&mut self) {
        self.names = self
            .all
            .iter()
            .enumerate()
            .map(|(i, u)| (u.name().to_string(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_test_utils::MockUnit;

    fn shard_of(units: Vec<MockUnit>) -> (Shard<MockUnit>, Vec<Arc<MockUnit>>) {
        let mut shard = Shard::default();
        let arcs: Vec<Arc<MockUnit>> = units.into_iter().map(Arc::new).collect();
        for unit in &arcs {
            shard.push(Arc::clone(unit)).unwrap();
        }
        (shard, arcs)
    }

    fn names(units: &[Arc<MockUnit>]) -> Vec<&str> {
        units.iter().map(|u| u.name()).collect()
    }

    #[test]
    fn push_tracks_state_and_enabled_units() {
        let (shard, _) = shard_of(vec![
            MockUnit::new("a"),
            MockUnit::new("b").disabled(),
            MockUnit::new("c"),
        ]);
        assert_eq!(shard.state(), ShardState::Registering);
        assert_eq!(shard.len(), 3);
        assert_eq!(names(shard.active()), vec!["a", "c"]);
        assert!(shard.unit("b").is_some());
        assert!(shard.active_unit("b").is_none());
        assert!(shard.has_active_unit("c"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let (mut shard, _) = shard_of(vec![MockUnit::new("a")]);
        let err = shard.push(Arc::new(MockUnit::new("a"))).unwrap_err();
        assert_eq!(err, UnitError::DuplicateName { name: "a".into() });
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn refresh_reevaluates_enabled_flag() {
        let (mut shard, arcs) = shard_of(vec![MockUnit::new("a"), MockUnit::new("b")]);
        arcs[0].set_enabled(false);
        assert_eq!(shard.active_len(), 2, "flag is only read on refresh");
        shard.refresh();
        assert_eq!(names(shard.active()), vec!["b"]);
        assert_eq!(shard.state(), ShardState::Built);
    }

    #[test]
    fn sort_survives_refresh_with_same_members() {
        let (mut shard, _) = shard_of(vec![
            MockUnit::new("late").requiring(["early"]),
            MockUnit::new("early"),
        ]);
        shard.sort().unwrap();
        assert_eq!(names(shard.active()), vec!["early", "late"]);
        shard.refresh();
        assert_eq!(names(shard.active()), vec!["early", "late"]);
        assert!(shard.is_sorted());
        assert_eq!(shard.unit("late").map(|u| u.name()), Some("late"));
    }

    #[test]
    fn enabling_a_unit_clears_sorted_flag() {
        let (mut shard, arcs) = shard_of(vec![
            MockUnit::new("x").disabled(),
            MockUnit::new("b").requiring(["a"]),
            MockUnit::new("a"),
        ]);
        shard.sort().unwrap();
        assert_eq!(names(shard.all()), vec!["x", "a", "b"]);
        arcs[0].set_enabled(true);
        shard.refresh();
        assert!(!shard.is_sorted());
        assert_eq!(names(shard.active()), vec!["x", "a", "b"]);
    }

    #[test]
    fn restriction_cache_and_priming() {
        let (mut shard, _) = shard_of(vec![
            MockUnit::new("everywhere"),
            MockUnit::new("block1").restricted_to([1]),
            MockUnit::new("block2").restricted_to([2, 3]),
        ]);
        assert!(shard.cached_for_restriction(RestrictionId(1)).is_none());
        assert_eq!(
            names(shard.restricted_or_insert(RestrictionId(1))),
            vec!["everywhere", "block1"]
        );
        assert!(shard.cached_for_restriction(RestrictionId(1)).is_some());
        assert!(shard.cached_for_restriction(RestrictionId(3)).is_none());

        shard.prime();
        assert_eq!(shard.state(), ShardState::Querying);
        assert_eq!(
            names(shard.cached_for_restriction(RestrictionId(3)).unwrap()),
            vec!["everywhere", "block2"]
        );
        assert_eq!(
            names(shard.cached_for_restriction(RestrictionId(99)).unwrap()),
            vec!["everywhere"]
        );
    }

    #[test]
    fn all_list_views_include_disabled_units() {
        let (mut shard, _) = shard_of(vec![
            MockUnit::new("everywhere"),
            MockUnit::new("off").restricted_to([5]).disabled(),
            MockUnit::new("on").restricted_to([5]),
        ]);
        assert!(shard.cached_all_for_restriction(RestrictionId(5)).is_none());
        assert_eq!(
            names(shard.all_restricted_or_insert(RestrictionId(5))),
            vec!["everywhere", "off", "on"]
        );
        assert_eq!(
            names(shard.restricted_or_insert(RestrictionId(5))),
            vec!["everywhere", "on"]
        );
        assert!(shard.has_for_restriction(RestrictionId(5)));

        shard.push(Arc::new(MockUnit::new("late").restricted_to([6]).disabled())).unwrap();
        assert!(shard.cached_all_for_restriction(RestrictionId(5)).is_none());
        assert!(shard.has_for_restriction(RestrictionId(6)));
        assert!(!shard.has_active_for_restriction(RestrictionId(6)));

        shard.prime();
        assert_eq!(
            names(shard.cached_all_for_restriction(RestrictionId(6)).unwrap()),
            vec!["everywhere", "late"]
        );
        assert_eq!(
            names(shard.cached_all_for_restriction(RestrictionId(40)).unwrap()),
            vec!["everywhere"]
        );

        shard.clear();
        assert!(shard.cached_all_for_restriction(RestrictionId(6)).is_none());
        assert!(!shard.has_for_restriction(RestrictionId(6)));
    }

    #[test]
    fn push_after_priming_invalidates() {
        let (mut shard, _) = shard_of(vec![MockUnit::new("a")]);
        shard.prime();
        shard.push(Arc::new(MockUnit::new("b"))).unwrap();
        assert_eq!(shard.state(), ShardState::Registering);
        assert!(shard.cached_for_restriction(RestrictionId(0)).is_none());
    }

    #[test]
    fn supplementary_queries() {
        let (shard, _) = shard_of(vec![
            MockUnit::new("a").restricted_to([4, 1]).requiring(["u"]),
            MockUnit::new("b").restricted_to([2]).requiring(["v"]),
            MockUnit::new("c").restricted_to([7]).disabled(),
        ]);
        assert_eq!(
            shard.active_restrictions().into_iter().collect::<Vec<_>>(),
            vec![RestrictionId(1), RestrictionId(2), RestrictionId(4)]
        );
        assert!(shard.has_active_for_restriction(RestrictionId(2)));
        assert!(!shard.has_active_for_restriction(RestrictionId(7)));
        assert_eq!(
            shard.collect_requires().into_iter().collect::<Vec<_>>(),
            vec!["u".to_string(), "v".to_string()]
        );
        assert_eq!(
            shard
                .collect_requires_for_restriction(RestrictionId(4))
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["u".to_string()]
        );
        assert_eq!(shard.describe_active("[DBG]"), "[DBG] a b");
    }

    #[test]
    fn clear_resets_to_empty() {
        let (mut shard, _) = shard_of(vec![MockUnit::new("a")]);
        shard.clear();
        assert_eq!(shard.state(), ShardState::Empty);
        assert!(shard.is_empty());
        assert!(shard.unit("a").is_none());
    }
}
