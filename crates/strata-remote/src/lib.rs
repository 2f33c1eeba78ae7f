//! # strata-remote
//!
//! Boundary to the remote registry and query service.
//!
//! - [`wire`]: typed documents for the cube list, cube metadata, compiled
//!   queries and query results
//! - [`client`]: the [`RemoteSchema`] seam and its HTTP implementation
//!
//! Failures map onto two error kinds. Transport errors, timeouts and non-2xx
//! answers are [`strata_core::Error::RemoteUnavailable`] and may be retried.
//! Empty or malformed bodies are [`strata_core::Error::RemoteDataInvalid`]
//! and need an upstream fix.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod wire;

pub use client::{HttpRemoteClient, RemoteSchema};
pub use wire::{
    CubeDocument, DomainDocument, FieldDocument, FilterExpression, FilterValue, Ordering,
    QueryDocument, QueryResponse, RemoteFailure, ResponseField, ResponseHeader, Rollup,
    SelectField, SortOrder,
};
