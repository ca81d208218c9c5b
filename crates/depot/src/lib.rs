//! Sharded unit registry and dependency-ordered scheduler.
//!
//! An [`ObjectRegistry`] catalogs computational units per worker shard
//! and answers restriction-filtered queries. [`PhaseIndex`],
//! [`TagIndex`] and [`GroupIndex`] partition a registry along execution
//! phase, output tag, and pre/post dependency group. Ordering comes from
//! `depot-resolve`.
//!
//! # Lifecycle
//!
//! Each shard moves through [`ShardState`]: units are added during a
//! single-threaded setup window, `refresh`/`sort` build the active
//! order, `prime` populates every lookup cache, and from then on all
//! reads take `&self` and can run from every worker at once. A new
//! setup window (for example after mesh adaptivity) starts with the
//! next `add` or `refresh`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod group_index;
pub mod phase_index;
pub mod registry;
pub mod shard;
pub mod tag_index;

pub use config::{ConfigError, CrossPhasePolicy, UnresolvedPolicy, WarehouseConfig};
pub use error::RegistryError;
pub use group_index::{Group, GroupIndex};
pub use phase_index::PhaseIndex;
pub use registry::ObjectRegistry;
pub use shard::{Shard, ShardState};
pub use tag_index::TagIndex;

pub use depot_core::{
    Phase, PhaseSet, RestrictionId, RestrictionSet, ShardId, TagId, TagSet, Unit, UnitError,
};
pub use depot_resolve::{CyclicDependencyError, ResolvedOrder, UnresolvedRequirement};
