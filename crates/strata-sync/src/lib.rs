//! # strata-sync
//!
//! Keeps the local catalog in step with the remote registries.
//!
//! - [`SyncEngine`]: refresh passes per registry or for all registries
//! - [`exposure`]: the allow/deny rule applied to the remote cube list
//! - [`generate`]: metric derivation from column capability flags
//! - [`health`]: the registry probe
//! - [`metrics`]: refresh counters and timings
//!
//! Refresh is best-effort per cube: one cube failing to fetch or apply is
//! reported and its siblings still sync. Running a pass twice against an
//! unchanged remote leaves the catalog unchanged.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod exposure;
pub mod generate;
pub mod health;
pub mod metrics;

pub use engine::{
    CubeOutcome, CubeSyncSummary, RefreshReport, RegistryRefresh, SyncEngine, apply_cube_document,
};
pub use exposure::{ExposedCubes, resolve_exposure};
pub use generate::{candidate_metrics, regenerate_metrics};
pub use health::{STATUS_OK, registry_status};
