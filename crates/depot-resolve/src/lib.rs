//! Dependency resolution for depot units.
//!
//! [`DependencyGraph`] turns the requires/provides declarations of a
//! list of units into edges; [`sort_by_dependencies`] orders the list so
//! every provider precedes its consumers, or reports the cycle that
//! makes that impossible.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod graph;

pub use graph::{
    sort_by_dependencies, CyclicDependencyError, DependencyGraph, ResolvedOrder,
    UnresolvedRequirement,
};
