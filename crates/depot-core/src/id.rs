//! Strongly-typed identifiers for shards, restrictions and tags.

use std::fmt;

/// Identifies a worker-thread shard of a registry.
///
/// Shards are fixed at registry construction. `ShardId(n)` is the n-th
/// worker in the externally managed pool; valid ids are `0..shard_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ShardId(pub u32);

impl ShardId {
    /// The shard id as a `usize` index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ShardId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a geometric domain a unit may be restricted to
/// (a subdomain block or a boundary).
///
/// The registry treats these as opaque keys; the mesh that gives them
/// meaning lives outside this workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RestrictionId(pub u32);

impl fmt::Display for RestrictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RestrictionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies an output accumulator (a residual vector, a Jacobian
/// variant) that units contribute to.
///
/// Ids are opaque: any `u32` is a valid tag, and nothing assumes the
/// ids in use are dense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u32);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TagId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
