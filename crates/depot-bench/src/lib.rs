//! Benchmark workloads for the depot registry.
//!
//! Provides deterministic unit populations shaped like a multiphysics
//! input file:
//!
//! - [`reference_profile`]: 1K units over 16 blocks
//! - [`stress_profile`]: 20K units over 256 blocks
//! - [`populate`]: register a profile into a [`PhaseIndex`]

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use depot::{Phase, PhaseIndex, RegistryError, ShardId};
use depot_test_utils::MockUnit;

/// Shape of a generated unit population.
#[derive(Clone, Copy, Debug)]
pub struct Profile {
    /// Number of units per shard.
    pub units: usize,
    /// Number of distinct restriction ids.
    pub blocks: u32,
    /// Number of distinct tags.
    pub tags: u32,
    /// Seed for the dependency wiring.
    pub seed: u64,
}

/// 1K units, 16 blocks, 8 tags.
pub fn reference_profile(seed: u64) -> Profile {
    Profile {
        units: 1_000,
        blocks: 16,
        tags: 8,
        seed,
    }
}

/// 20K units, 256 blocks, 32 tags.
pub fn stress_profile(seed: u64) -> Profile {
    Profile {
        units: 20_000,
        blocks: 256,
        tags: 32,
        seed,
    }
}

/// Generate the units of one shard, registered in reverse dependency
/// order so every sort has to permute.
///
/// Unit `i` requires unit `i - 1` and one pseudo-random earlier unit,
/// so the graph is acyclic. Every fourth unit is universal; the others
/// run on one block.
pub fn generate_units(profile: &Profile) -> Vec<Arc<MockUnit>> {
    let mut units = Vec::with_capacity(profile.units);
    for i in (0..profile.units).rev() {
        let mut requires = Vec::new();
        if i > 0 {
            requires.push(format!("k{}", i - 1));
            let far = (profile
                .seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(i as u64 * 1442695040888963407)
                % i as u64) as usize;
            requires.push(format!("k{far}"));
        }
        let phase = if i % 2 == 0 {
            Phase::Linear
        } else {
            Phase::Nonlinear
        };
        let mut unit = MockUnit::new(format!("k{i}"))
            .requiring(requires)
            .phases([phase])
            .tags([i as u32 % profile.tags]);
        if i % 4 != 0 {
            unit = unit.restricted_to([i as u32 % profile.blocks]);
        }
        units.push(Arc::new(unit));
    }
    units
}

/// Register `units` into `shard` of `index`.
pub fn populate(
    index: &mut PhaseIndex<MockUnit>,
    units: &[Arc<MockUnit>],
    shard: ShardId,
) -> Result<(), RegistryError> {
    for unit in units {
        index.add(Arc::clone(unit), shard)?;
    }
    Ok(())
}
