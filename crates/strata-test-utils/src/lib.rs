//! Shared test utilities for strata integration tests.
//!
//! This crate provides:
//! - [`MockRemote`]: scriptable in-memory remote service with call recording
//! - [`FakeRemoteServer`]: the same service over real HTTP on a loopback port
//! - [`TestContext`]: catalog, remote and config wired together
//! - Cube document and query response fixtures
//! - Catalog assertion helpers

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod remote;
pub mod server;

pub use assertions::*;
pub use fixtures::*;
pub use remote::*;
pub use server::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("strata=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
