//! The sharded [`ObjectRegistry`].
//!
//! Setup operations take `&mut self` and return [`RegistryError`];
//! worker reads go through [`ObjectRegistry::shard`] or the `try_*`
//! accessors and take `&self`, so a primed registry can be shared by
//! reference across every worker thread.

use std::fmt;
use std::sync::Arc;

use depot_core::{Phase, RestrictionId, ShardId, Unit};
use depot_resolve::{DependencyGraph, ResolvedOrder};
use tracing::{debug, trace};

use crate::config::{ConfigError, UnresolvedPolicy, WarehouseConfig};
use crate::error::RegistryError;
use crate::shard::{Shard, ShardState};

/// Per-shard storage of computational units.
///
/// `U` is the unit type the registry holds; the default `dyn Unit`
/// stores heterogeneous units behind `Arc<dyn Unit>`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use depot::{ObjectRegistry, ShardId, Unit};
///
/// struct Kernel(&'static str, &'static [&'static str]);
///
/// impl Unit for Kernel {
///     fn name(&self) -> &str { self.0 }
///     fn requires(&self) -> Vec<String> {
///         self.1.iter().map(|s| s.to_string()).collect()
///     }
/// }
///
/// let mut registry: ObjectRegistry = ObjectRegistry::new(1);
/// registry.add(Arc::new(Kernel("convection", &["diffusion"])), ShardId(0)).unwrap();
/// registry.add(Arc::new(Kernel("diffusion", &[])), ShardId(0)).unwrap();
/// registry.sort(ShardId(0)).unwrap();
///
/// let order: Vec<&str> = registry
///     .shard(ShardId(0))
///     .unwrap()
///     .active()
///     .iter()
///     .map(|u| u.name())
///     .collect();
/// assert_eq!(order, ["diffusion", "convection"]);
/// ```
pub struct ObjectRegistry<U: Unit + ?Sized = dyn Unit> {
    shards: Vec<Shard<U>>,
    unresolved: UnresolvedPolicy,
}

impl<U: Unit + ?Sized> fmt::Debug for ObjectRegistry<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("shards", &self.shards)
            .field("unresolved", &self.unresolved)
            .finish()
    }
}

impl<U: Unit + ?Sized> ObjectRegistry<U> {
    /// Create a registry with `shard_count` shards and default policies.
    ///
    /// A count of zero builds a single shard. Go through
    /// [`from_config`](Self::from_config) to have zero rejected with
    /// [`ConfigError::ZeroShards`] instead.
    pub fn new(shard_count: usize) -> Self {
        Self::with_policy(shard_count, UnresolvedPolicy::default())
    }

    /// Create a registry from a validated configuration.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_policy(
            config.resolved_shard_count(),
            config.unresolved,
        ))
    }

    pub(crate) fn with_policy(shard_count: usize, unresolved: UnresolvedPolicy) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| Shard::default()).collect();
        Self { shards, unresolved }
    }

    /// An empty registry with the same shard count and policy.
    pub(crate) fn empty_like(&self) -> Self {
        Self::with_policy(self.shards.len(), self.unresolved)
    }

    /// Number of shards, fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Read access to one shard.
    pub fn shard(&self, shard: ShardId) -> Result<&Shard<U>, RegistryError> {
        self.shards
            .get(shard.index())
            .ok_or(RegistryError::UnknownShard {
                shard,
                shard_count: self.shards.len(),
            })
    }

    fn shard_mut(&mut self, shard: ShardId) -> Result<&mut Shard<U>, RegistryError> {
        let shard_count = self.shards.len();
        self.shards
            .get_mut(shard.index())
            .ok_or(RegistryError::UnknownShard { shard, shard_count })
    }

    /// Iterate over every shard with its id.
    pub fn shards(&self) -> impl Iterator<Item = (ShardId, &Shard<U>)> {
        self.shards
            .iter()
            .enumerate()
            .map(|(i, s)| (ShardId(i as u32), s))
    }

    /// Lifecycle state of a shard.
    pub fn state(&self, shard: ShardId) -> Result<ShardState, RegistryError> {
        Ok(self.shard(shard)?.state())
    }

    // ── Setup ──────────────────────────────────────────────────

    /// Register a unit in a shard.
    ///
    /// The unit is appended to the all-list, and to the active-list if
    /// it is enabled. Restriction caches of the shard are dropped.
    pub fn add(&mut self, unit: Arc<U>, shard: ShardId) -> Result<(), RegistryError> {
        let target = self.shard_mut(shard)?;
        target.push(unit)?;
        Ok(())
    }

    /// Rebuild a shard's active-list from its all-list by re-reading
    /// every unit's enabled flag. Restriction caches are dropped.
    pub fn refresh(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        let target = self.shard_mut(shard)?;
        target.refresh();
        debug!(
            %shard,
            all = target.len(),
            active = target.active_len(),
            "refreshed registry shard"
        );
        Ok(())
    }

    /// [`refresh`](Self::refresh) every shard.
    pub fn refresh_all(&mut self) {
        for shard in &mut self.shards {
            shard.refresh();
        }
    }

    /// Permute a shard's active-list into dependency order.
    ///
    /// Fails with [`RegistryError::UnresolvedRequirement`] under
    /// [`UnresolvedPolicy::Error`], checked before any cycle, or with
    /// [`RegistryError::CyclicDependency`] if no order exists. Either way
    /// the shard is left exactly as it was, unsorted.
    pub fn sort(&mut self, shard: ShardId) -> Result<ResolvedOrder, RegistryError> {
        let policy = self.unresolved;
        let target = self.shard_mut(shard)?;

        if policy == UnresolvedPolicy::Error {
            let graph = DependencyGraph::build(target.active());
            if let Some(missing) = graph.unresolved().first() {
                return Err(RegistryError::UnresolvedRequirement {
                    unit: missing.unit.clone(),
                    requirement: missing.requirement.clone(),
                });
            }
        }
        let resolved = target.sort()?;

        debug!(
            %shard,
            units = target.active_len(),
            edges = resolved.edge_count,
            unresolved = resolved.unresolved.len(),
            "sorted registry shard"
        );
        trace!(%shard, order = %target.describe_active(""), "resolved order");
        Ok(resolved)
    }

    /// [`sort`](Self::sort) every shard, stopping at the first error.
    pub fn sort_all(&mut self) -> Result<(), RegistryError> {
        for i in 0..self.shards.len() {
            self.sort(ShardId(i as u32))?;
        }
        Ok(())
    }

    /// Populate every restriction cache of a shard so that
    /// [`try_active_for_restriction`](Self::try_active_for_restriction)
    /// answers any id without mutation.
    pub fn prime(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        let target = self.shard_mut(shard)?;
        target.prime();
        debug!(
            %shard,
            restrictions = target.active_restrictions().len(),
            "primed registry shard"
        );
        Ok(())
    }

    pub(crate) fn mark_sorted(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.shard_mut(shard)?.mark_sorted();
        Ok(())
    }

    /// [`prime`](Self::prime) every shard.
    pub fn prime_all(&mut self) {
        for shard in &mut self.shards {
            shard.prime();
        }
    }

    /// Remove every unit from a shard, returning it to
    /// [`ShardState::Empty`].
    pub fn clear(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.shard_mut(shard)?.clear();
        Ok(())
    }

    /// Enabled units of a shard that run on `id`, in active order.
    ///
    /// The first call for an id scans the active-list and caches the
    /// result; later calls return the cached view. Unknown ids yield the
    /// universal units only, never an error.
    pub fn active_for_restriction(
        &mut self,
        id: RestrictionId,
        shard: ShardId,
    ) -> Result<&[Arc<U>], RegistryError> {
        Ok(self.shard_mut(shard)?.restricted_or_insert(id))
    }

    /// Every registered unit of a shard that runs on `id`, disabled
    /// units included, in all-list order. Cached like
    /// [`active_for_restriction`](Self::active_for_restriction).
    pub fn all_for_restriction(
        &mut self,
        id: RestrictionId,
        shard: ShardId,
    ) -> Result<&[Arc<U>], RegistryError> {
        Ok(self.shard_mut(shard)?.all_restricted_or_insert(id))
    }

    // ── Querying ───────────────────────────────────────────────

    /// Cached restriction view, never populating anything.
    ///
    /// `None` if the shard id is out of range, or if `id` was never
    /// cached and the shard has not been primed.
    pub fn try_active_for_restriction(
        &self,
        id: RestrictionId,
        shard: ShardId,
    ) -> Option<&[Arc<U>]> {
        self.shards.get(shard.index())?.cached_for_restriction(id)
    }

    /// Cached all-list restriction view, never populating anything.
    /// `None` under the same conditions as
    /// [`try_active_for_restriction`](Self::try_active_for_restriction).
    pub fn try_all_for_restriction(&self, id: RestrictionId, shard: ShardId) -> Option<&[Arc<U>]> {
        self.shards.get(shard.index())?.cached_all_for_restriction(id)
    }

    /// Invoke `on_phase` on every enabled unit of a shard that declares
    /// `phase`, in active-list order. Returns how many units ran.
    pub fn lifecycle_dispatch(&self, phase: Phase, shard: ShardId) -> Result<usize, RegistryError> {
        Ok(self.shard(shard)?.dispatch(phase))
    }
}
