//! # strata-catalog
//!
//! The local catalog of remote datasets.
//!
//! A [`Registry`] owns [`Cube`]s; a cube owns its [`Column`]s, [`Metric`]s
//! and [`Lookback`] policy rows. Rows live in id-keyed tables
//! ([`CatalogTables`]) and refer to their owners by id only. The shared
//! [`Catalog`] handle provides snapshot reads, all-or-nothing transactions
//! and JSON snapshot persistence.
//!
//! ## Example
//!
//! ```rust
//! use strata_catalog::{Catalog, RegistrySpec};
//!
//! let catalog = Catalog::new();
//! let registry = catalog
//!     .transaction(|t| {
//!         t.insert_registry(RegistrySpec {
//!             name: "prod".into(),
//!             host: "reporting.example.com".into(),
//!             port: 80,
//!             base_path: "api/v2".into(),
//!             domain_endpoint: "domain".into(),
//!             sync_request_endpoint: "sync".into(),
//!             exposed_schema: "reporting".into(),
//!             allow_list: None,
//!             deny_list: None,
//!             cache_timeout: None,
//!         })
//!     })
//!     .unwrap();
//! let cube = catalog.transaction(|t| t.ensure_cube(registry, "stats")).unwrap();
//! assert_eq!(
//!     catalog.read(|t| t.cube_full_name(cube)).unwrap().as_deref(),
//!     Some("[prod].[stats]")
//! );
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod column;
pub mod cube;
pub mod dependents;
pub mod id;
pub mod lookback;
pub mod metric;
pub mod registry;
pub mod store;
pub mod tables;

pub use column::{AggregationFlags, Column, ColumnKind, ColumnUpdate};
pub use cube::Cube;
pub use dependents::{DependentReports, NoDependentReports};
pub use id::{ColumnId, CubeId, LookbackId, MetricId, RegistryId};
pub use lookback::{Grain, Lookback, PolicyEntry, PolicyLimit, RequestType};
pub use metric::{AggregationExpression, Metric, MetricType, NewMetric};
pub use registry::{CubeExposure, DEFAULT_EXPOSED_SCHEMA, Registry, RegistrySpec};
pub use store::Catalog;
pub use tables::{CatalogTables, CubeRemoval};
