//! Warehouse configuration, validation, and error types.
//!
//! [`WarehouseConfig`] is the input for building registries and indices
//! with a consistent shard count and ordering policy.
//! [`validate()`](WarehouseConfig::validate) checks it at setup.

use std::error::Error;
use std::fmt;

// ── Policies ───────────────────────────────────────────────────────

/// What to do when a unit in one phase requires a name that only units
/// outside that phase provide.
///
/// Each phase is ordered on its own, so such an edge is never enforced
/// by any single phase's order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossPhasePolicy {
    /// Accept silently.
    Ignore,
    /// Accept and emit a `tracing` warning per requirement.
    #[default]
    Warn,
    /// Fail the sort with
    /// [`RegistryError::CrossPhaseRequirement`](crate::RegistryError::CrossPhaseRequirement).
    Error,
}

/// What to do when a unit requires a name nothing in its shard provides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Accept; the provider is assumed to live outside the registry.
    #[default]
    Allow,
    /// Fail the sort with
    /// [`RegistryError::UnresolvedRequirement`](crate::RegistryError::UnresolvedRequirement).
    Error,
}

// ── WarehouseConfig ────────────────────────────────────────────────

/// Configuration shared by a registry and the indices wrapping it.
#[derive(Clone, Debug, Default)]
pub struct WarehouseConfig {
    /// Number of worker shards. `None` = auto-detect
    /// (`available_parallelism`, clamped to `[1, 64]`).
    pub shard_count: Option<usize>,
    /// Cross-phase requirement handling. Default: [`CrossPhasePolicy::Warn`].
    pub cross_phase: CrossPhasePolicy,
    /// Unresolved requirement handling. Default: [`UnresolvedPolicy::Allow`].
    pub unresolved: UnresolvedPolicy,
}

impl WarehouseConfig {
    /// Upper bound on an explicit shard count.
    pub const MAX_SHARDS: usize = 1024;

    /// Single-shard configuration with default policies.
    pub fn serial() -> Self {
        Self {
            shard_count: Some(1),
            ..Self::default()
        }
    }

    /// Configuration with an explicit shard count and default policies.
    pub fn with_shards(shard_count: usize) -> Self {
        Self {
            shard_count: Some(shard_count),
            ..Self::default()
        }
    }

    /// Resolve the actual shard count, applying auto-detection if `None`.
    ///
    /// Call [`validate()`](Self::validate) first; an explicit value is
    /// returned as-is.
    pub fn resolved_shard_count(&self) -> usize {
        match self.shard_count {
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .clamp(1, 64),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.shard_count {
            Some(0) => Err(ConfigError::ZeroShards),
            Some(n) if n > Self::MAX_SHARDS => Err(ConfigError::TooManyShards {
                configured: n,
                max: Self::MAX_SHARDS,
            }),
            _ => Ok(()),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`WarehouseConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `shard_count` is `Some(0)`.
    ZeroShards,
    /// `shard_count` exceeds [`WarehouseConfig::MAX_SHARDS`].
    TooManyShards {
        /// The configured value.
        configured: usize,
        /// The allowed maximum.
        max: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroShards => write!(f, "shard_count must be at least 1"),
            Self::TooManyShards { configured, max } => {
                write!(f, "shard_count {configured} exceeds maximum of {max}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WarehouseConfig::default();
        assert_eq!(config.shard_count, None);
        assert_eq!(config.cross_phase, CrossPhasePolicy::Warn);
        assert_eq!(config.unresolved, UnresolvedPolicy::Allow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn auto_detect_is_clamped() {
        let n = WarehouseConfig::default().resolved_shard_count();
        assert!((1..=64).contains(&n));
    }

    #[test]
    fn explicit_count_is_used_verbatim() {
        assert_eq!(WarehouseConfig::with_shards(12).resolved_shard_count(), 12);
        assert_eq!(WarehouseConfig::serial().resolved_shard_count(), 1);
    }

    #[test]
    fn zero_and_oversized_counts_rejected() {
        assert_eq!(
            WarehouseConfig::with_shards(0).validate(),
            Err(ConfigError::ZeroShards)
        );
        assert_eq!(
            WarehouseConfig::with_shards(5000).validate(),
            Err(ConfigError::TooManyShards {
                configured: 5000,
                max: 1024
            })
        );
    }
}
