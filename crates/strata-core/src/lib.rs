//! # strata-core
//!
//! Shared primitives for the strata workspace:
//!
//! - **Error Types**: the error kinds every component reports ([`Error`])
//! - **Request Context**: correlation id and caller identity for remote calls
//! - **Configuration**: defaults and environment overrides
//! - **Observability**: logging initialization and span helpers
//! - **Human Time**: granularity and relative datetime parsing
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let ctx = RequestContext::new("analyst");
//! assert_eq!(ctx.caller_identity(), "analyst");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod human_time;
pub mod observability;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::context::RequestContext;
    pub use crate::error::{Error, Result};
}

pub use config::Config;
pub use context::RequestContext;
pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
