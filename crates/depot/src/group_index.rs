//! Split of a registry into "pre" and "post" dependency groups.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use depot_core::{ShardId, Unit};
use tracing::debug;

use crate::config::UnresolvedPolicy;
use crate::error::RegistryError;
use crate::registry::ObjectRegistry;
use crate::shard::Shard;

/// One of the two groups of a [`GroupIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    /// Units named in the membership list.
    Pre,
    /// Every other enabled unit.
    Post,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// A registry whose enabled units are partitioned into [`Group::Pre`]
/// and [`Group::Post`] by name.
///
/// Groups are rebuilt wholesale by
/// [`update_groups`](GroupIndex::update_groups); nothing is tracked
/// incrementally. Each group is sorted using only its own units, so a
/// requirement met by the other group counts as unresolved and is
/// accepted, and a cycle spanning both groups is not an error.
pub struct GroupIndex<U: Unit + ?Sized = dyn Unit> {
    registry: ObjectRegistry<U>,
    pre: ObjectRegistry<U>,
    post: ObjectRegistry<U>,
}

impl<U: Unit + ?Sized> fmt::Debug for GroupIndex<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupIndex")
            .field("registry", &self.registry)
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}

impl<U: Unit + ?Sized> GroupIndex<U> {
    /// Create an index with `shard_count` shards.
    pub fn new(shard_count: usize) -> Self {
        Self::from_registry(ObjectRegistry::new(shard_count))
    }

    /// Wrap an existing registry. Both groups start empty.
    pub fn from_registry(registry: ObjectRegistry<U>) -> Self {
        let shard_count = registry.shard_count();
        let pre = ObjectRegistry::with_policy(shard_count, UnresolvedPolicy::Allow);
        let post = ObjectRegistry::with_policy(shard_count, UnresolvedPolicy::Allow);
        Self {
            registry,
            pre,
            post,
        }
    }

    /// The wrapped registry.
    pub fn registry(&self) -> &ObjectRegistry<U> {
        &self.registry
    }

    /// One group's registry.
    pub fn group(&self, group: Group) -> &ObjectRegistry<U> {
        match group {
            Group::Pre => &self.pre,
            Group::Post => &self.post,
        }
    }

    /// The [`Group::Pre`] registry.
    pub fn pre(&self) -> &ObjectRegistry<U> {
        &self.pre
    }

    /// The [`Group::Post`] registry.
    pub fn post(&self) -> &ObjectRegistry<U> {
        &self.post
    }

    /// Register a unit in the wrapped registry. Groups are untouched
    /// until the next [`update_groups`](Self::update_groups).
    pub fn add(&mut self, unit: Arc<U>, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.add(unit, shard)
    }

    /// Refresh the wrapped registry and both groups.
    pub fn refresh(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.refresh(shard)?;
        self.pre.refresh(shard)?;
        self.post.refresh(shard)
    }

    /// [`refresh`](Self::refresh) every shard.
    pub fn refresh_all(&mut self) {
        self.registry.refresh_all();
        self.pre.refresh_all();
        self.post.refresh_all();
    }

    /// Rebuild both groups of `shard` from the wrapped registry's
    /// active-list: units named in `members` go to [`Group::Pre`], all
    /// others to [`Group::Post`], keeping active order.
    pub fn update_groups<I>(&mut self, members: I, shard: ShardId) -> Result<(), RegistryError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let source = self.registry.shard(shard)?;
        regroup(source, members, &mut self.pre, &mut self.post, shard)
    }

    /// Like [`update_groups`](Self::update_groups), but partitions the
    /// active-list of another registry, such as a phase sub-registry.
    pub fn update_groups_from<I>(
        &mut self,
        source: &ObjectRegistry<U>,
        members: I,
        shard: ShardId,
    ) -> Result<(), RegistryError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        regroup(source.shard(shard)?, members, &mut self.pre, &mut self.post, shard)
    }

    /// Sort each group of `shard` on its own units.
    ///
    /// Both groups are always attempted; a cycle in one does not keep
    /// the other unsorted. The first failure, pre before post, is
    /// returned. The wrapped registry is left in registration order.
    pub fn sort(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        let pre = self.pre.sort(shard);
        let post = self.post.sort(shard);
        debug!(
            %shard,
            pre_sorted = pre.is_ok(),
            post_sorted = post.is_ok(),
            "sorted dependency groups"
        );
        pre?;
        post?;
        Ok(())
    }

    /// [`sort`](Self::sort) every shard, stopping at the first error.
    pub fn sort_all(&mut self) -> Result<(), RegistryError> {
        for i in 0..self.registry.shard_count() {
            self.sort(ShardId(i as u32))?;
        }
        Ok(())
    }

    /// Prime the wrapped registry and both groups.
    pub fn prime(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.prime(shard)?;
        self.pre.prime(shard)?;
        self.post.prime(shard)
    }

    /// [`prime`](Self::prime) every shard.
    pub fn prime_all(&mut self) {
        self.registry.prime_all();
        self.pre.prime_all();
        self.post.prime_all();
    }

    /// Remove every unit of a shard from the wrapped registry and both
    /// groups.
    pub fn clear(&mut self, shard: ShardId) -> Result<(), RegistryError> {
        self.registry.clear(shard)?;
        self.pre.clear(shard)?;
        self.post.clear(shard)
    }
}

fn regroup<U, I>(
    source: &Shard<U>,
    members: I,
    pre: &mut ObjectRegistry<U>,
    post: &mut ObjectRegistry<U>,
    shard: ShardId,
) -> Result<(), RegistryError>
where
    U: Unit + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let members: HashSet<String> = members
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect();
    pre.clear(shard)?;
    post.clear(shard)?;
    for unit in source.active() {
        let target = if members.contains(unit.name()) {
            &mut *pre
        } else {
            &mut *post
        };
        target.add(Arc::clone(unit), shard)?;
    }
    debug!(
        %shard,
        pre = pre.shard(shard)?.len(),
        post = post.shard(shard)?.len(),
        "rebuilt dependency groups"
    );
    Ok(())
}
