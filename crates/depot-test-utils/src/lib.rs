//! Test utilities and mock units for depot development.
//!
//! Provides [`MockUnit`], a builder-style [`Unit`](depot_core::Unit)
//! implementation with every optional capability configurable, and
//! [`init_tracing`] for tests that want to see setup logging.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{new_dispatch_log, DispatchLog, MockUnit};

/// Install a test-friendly `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
