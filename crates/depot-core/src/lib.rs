//! Core types and traits for the depot unit registry.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other depot crate: shard, restriction
//! and tag identifiers, execution phases, the [`TagSet`], the
//! [`RestrictionSet`], the [`Unit`] trait, and unit validation errors.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod phase;
pub mod restriction;
pub mod tag;
pub mod unit;

pub use error::{ParsePhaseError, UnitError};
pub use id::{RestrictionId, ShardId, TagId};
pub use phase::{Phase, PhaseSet};
pub use restriction::RestrictionSet;
pub use tag::{TagSet, TagSetIter};
pub use unit::{validate_unit, Unit};
