//! # strata-query
//!
//! Turns analytical requests into remote query documents and shapes what
//! comes back.
//!
//! - [`compile`]: deterministic compilation under the cube's lookback and
//!   window policy
//! - [`policy`]: grain resolution and limit checks
//! - [`normalize`]: result shaping and the derived `__timestamp` column
//! - [`QueryService`]: resolve, compile, execute and normalize in one call
//! - [`probe`]: the cube health probe
//!
//! A request that breaks its policy is rejected before anything is sent to
//! the remote.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod compiler;
pub mod filters;
pub mod metrics;
pub mod normalizer;
pub mod policy;
pub mod probe;
pub mod request;
pub mod service;

pub use compiler::{CompiledQuery, CompilerSettings, compile};
pub use filters::split_filter_values;
pub use normalizer::{NormalizeContext, ResultSet, TIMESTAMP, normalize};
pub use policy::{Limits, PolicyView, resolve_grain};
pub use request::{FilterClause, OrderBy, QueryRequest};
pub use service::{QueryResult, QueryService};
