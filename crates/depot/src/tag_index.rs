//! Sub-registries keyed by output-accumulator tags.

use std::fmt;
use std::sync::Arc;

use depot_core::{ShardId, TagId, TagSet, Unit};
use depot_resolve::ResolvedOrder;
use indexmap::IndexMap;
use tracing::debug;

use crate::config::{ConfigError, WarehouseConfig};
use crate::error::RegistryError;
use crate::registry::ObjectRegistry;

/// A registry plus lazily built, cached per-tag sub-registries.
///
/// A sub-registry for a tag set holds, in the parent's active order,
/// every enabled unit of the shard whose declared tags intersect the
/// set. Sub-registries are shared as `Arc`s: until the next structural
/// change to the shard, repeated lookups return the same instance.
pub struct TagIndex<U: Unit + ?Sized = dyn Unit> {
    registry: ObjectRegistry<U>,
    by_tags: Vec<IndexMap<TagSet, Arc<ObjectRegistry<U>>>>,
}

impl<U: Unit + ?Sized> fmt::Debug for TagIndex<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagIndex")
            .field("registry", &self.registry)
            .field(
                "cached",
                &self.by_tags.iter().map(IndexMap::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<U: Unit + ?Sized> TagIndex<U> {
    /// Create an index with `shard_count` shards.
    pub fn new(shard_count: usize) -> Self {
        Self::from_registry(ObjectRegistry::new(shard_count))
    }

    /// Create an index from a validated configuration.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_registry(ObjectRegistry::from_config(config)?))
    }

    /// Wrap an existing registry. No sub-registry is built until asked.
    pub fn from_registry(registry: ObjectRegistry<U>) -> Self {
        let by_tags = (0..registry.shard_count()).map(|_| IndexMap::new()).collect();
        Self { registry, by_tags }
    }

    /// The wrapped registry.
    pub fn registry(&self) -> &ObjectRegistry<U> {
        &self.registry
    }

    // ── Setup ──────────────────────────────────────────────────

    /// Register a unit and drop the shard's tag caches.
    pub fn add(&mut self, unit: Arc<U>, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.add(unit, shard)?;
        self.invalidate(shard);
        Ok(())
    }

    /// Refresh the wrapped registry and drop the shard's tag caches.
    pub fn refresh(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.refresh(shard)?;
        self.invalidate(shard);
        Ok(())
    }

    /// [`refresh`](Self::refresh) every shard.
    pub fn refresh_all(&mut self) {
        self.registry.refresh_all();
        self.by_tags.iter_mut().for_each(IndexMap::clear);
    }

    /// Sort the wrapped registry and drop the shard's tag caches.
    pub fn sort(&mut self, shard: ShardId) -> Result<ResolvedOrder, RegistryError> {
        let resolved = self.registry.sort(shard)?;
        self.invalidate(shard);
        Ok(resolved)
    }

    /// [`sort`](Self::sort) every shard, stopping at the first error.
    pub fn sort_all(&mut self) -> Result<(), RegistryError> {
        for i in 0..self.registry.shard_count() {
            self.sort(ShardId(i as u32))?;
        }
        Ok(())
    }

    /// Prime the wrapped registry and build the single-tag
    /// sub-registry of every tag an enabled unit declares.
    pub fn prime(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.prime(shard)?;
        let declared = self
            .registry
            .shard(shard)?
            .active()
            .iter()
            .fold(TagSet::empty(), |acc, u| acc.union(&u.declared_tags()));
        for tag in &declared {
            self.get_for_tag(tag, shard)?;
        }
        debug!(%shard, tags = declared.len(), "primed tag index");
        Ok(())
    }

    /// [`prime`](Self::prime) every shard, stopping at the first error.
    pub fn prime_all(&mut self) -> Result<(), RegistryError> {
        for i in 0..self.registry.shard_count() {
            self.prime(ShardId(i as u32))?;
        }
        Ok(())
    }

    /// Remove every unit of a shard and drop its tag caches.
    pub fn clear(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.clear(shard)?;
        self.invalidate(shard);
        Ok(())
    }

    /// Sub-registry of enabled units contributing to `tag`.
    pub fn get_for_tag(
        &mut self,
        tag: TagId,
        shard: ShardId,
    ) -> Result<Arc<ObjectRegistry<U>>, RegistryError> {
        self.get_for_tag_set([tag], shard)
    }

    /// Sub-registry of enabled units contributing to any tag in `tags`.
    ///
    /// The collection is normalized first, so orderings or duplicates of
    /// the same tags share one cache entry. Built on first request. The
    /// sub-registry keeps the parent's order and reports itself sorted
    /// when the parent shard is.
    pub fn get_for_tag_set<I>(
        &mut self,
        tags: I,
        shard: ShardId,
    ) -> Result<Arc<ObjectRegistry<U>>, RegistryError>
    where
        I: IntoIterator<Item = TagId>,
    {
        let key: TagSet = tags.into_iter().collect();
        let source = self.registry.shard(shard)?;
        if let Some(hit) = self.by_tags[shard.index()].get(&key) {
            return Ok(Arc::clone(hit));
        }

        let mut sub = self.registry.empty_like();
        for unit in source.active() {
            if unit.declared_tags().intersects(&key) {
                sub.add(Arc::clone(unit), shard)?;
            }
        }
        if source.is_sorted() {
            sub.mark_sorted(shard)?;
        }
        sub.prime(shard)?;

        let sub = Arc::new(sub);
        self.by_tags[shard.index()].insert(key, Arc::clone(&sub));
        Ok(sub)
    }

    fn invalidate(&mut self, shard: ShardId) {
        if let Some(cache) = self.by_tags.get_mut(shard.index()) {
            cache.clear();
        }
    }

    // ── Querying ───────────────────────────────────────────────

    /// Cached sub-registry for `tag`, never building one.
    pub fn try_get_for_tag(&self, tag: TagId, shard: ShardId) -> Option<&Arc<ObjectRegistry<U>>> {
        self.try_get_for_tag_set([tag], shard)
    }

    /// Cached sub-registry for `tags`, never building one.
    pub fn try_get_for_tag_set<I>(&self, tags: I, shard: ShardId) -> Option<&Arc<ObjectRegistry<U>>>
    where
        I: IntoIterator<Item = TagId>,
    {
        let key: TagSet = tags.into_iter().collect();
        self.by_tags.get(shard.index())?.get(&key)
    }
}
