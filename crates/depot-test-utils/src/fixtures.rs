//! Reusable unit fixtures.
//!
//! [`MockUnit`] covers every capability of the [`Unit`] trait through a
//! builder, so tests can describe a kernel in one expression:
//!
//! ```ignore
//! MockUnit::new("K2").providing(["convection"]).requiring(["diffusion"])
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use depot_core::{Phase, PhaseSet, RestrictionId, RestrictionSet, TagId, TagSet, Unit};

/// Shared record of `(unit name, phase)` lifecycle calls, in call order.
pub type DispatchLog = Arc<Mutex<Vec<(String, Phase)>>>;

/// Create an empty [`DispatchLog`].
pub fn new_dispatch_log() -> DispatchLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Configurable unit for registry and resolver tests.
///
/// The enabled flag is atomic so tests can flip it through an `Arc`
/// between refreshes.
pub struct MockUnit {
    pub name: String,
    pub phases: PhaseSet,
    pub requires: Vec<String>,
    /// `None` keeps the trait default (the unit's own name).
    pub provides: Option<Vec<String>>,
    pub tags: TagSet,
    pub restriction: RestrictionSet,
    enabled: AtomicBool,
    hits: AtomicUsize,
    log: Option<DispatchLog>,
}

impl MockUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: PhaseSet::empty(),
            requires: Vec::new(),
            provides: None,
            tags: TagSet::empty(),
            restriction: RestrictionSet::Universal,
            enabled: AtomicBool::new(true),
            hits: AtomicUsize::new(0),
            log: None,
        }
    }

    pub fn phases<I: IntoIterator<Item = Phase>>(mut self, phases: I) -> Self {
        self.phases = phases.into_iter().collect();
        self
    }

    pub fn requiring<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn providing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn tags<I: IntoIterator<Item = u32>>(mut self, tags: I) -> Self {
        self.tags = tags.into_iter().map(TagId).collect();
        self
    }

    /// Restrict to the given domain ids.
    pub fn restricted_to<I: IntoIterator<Item = u32>>(mut self, ids: I) -> Self {
        self.restriction = RestrictionSet::only(ids.into_iter().map(RestrictionId));
        self
    }

    pub fn disabled(self) -> Self {
        self.enabled.store(false, Ordering::Relaxed);
        self
    }

    /// Record every `on_phase` call into `log`.
    pub fn logging_to(mut self, log: &DispatchLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// How many times `on_phase` has been called.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

impl Unit for MockUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn declared_phases(&self) -> PhaseSet {
        self.phases.clone()
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn provides(&self) -> Vec<String> {
        match &self.provides {
            Some(names) => names.clone(),
            None => vec![self.name.clone()],
        }
    }

    fn declared_tags(&self) -> TagSet {
        self.tags.clone()
    }

    fn restriction(&self) -> RestrictionSet {
        self.restriction.clone()
    }

    fn on_phase(&self, phase: Phase) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if let Some(log) = &self.log {
            if let Ok(mut entries) = log.lock() {
                entries.push((self.name.clone(), phase));
            }
        }
    }
}
