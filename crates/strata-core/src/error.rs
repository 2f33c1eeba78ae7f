//! Error types and result aliases for strata.
//!
//! One error enum is shared by every crate in the workspace so that callers can
//! branch on the kind of failure (user-correctable range violation, retryable
//! remote outage, upstream data defect, legitimate empty result) without
//! unwrapping layers of wrappers.

use std::fmt;

use chrono::NaiveDate;

/// The result type used throughout strata.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in strata operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A query asked for more history or a wider span than the cube allows.
    ///
    /// The message always names the computed earliest date or the maximum span.
    #[error("{message}")]
    RangeViolation {
        /// Human-readable description naming the violated limit.
        message: String,
    },

    /// The remote service could not be reached, timed out, or answered non-2xx.
    #[error("remote unavailable (registry {registry}, request {request_id}): {message}")]
    RemoteUnavailable {
        /// Registry that was being contacted.
        registry: String,
        /// Correlation id sent with the request.
        request_id: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The remote service answered, but with a body that cannot be used.
    #[error("invalid remote data (registry {registry}, request {request_id}): {message}")]
    RemoteDataInvalid {
        /// Registry that produced the data.
        registry: String,
        /// Correlation id sent with the request.
        request_id: String,
        /// Description of the defect.
        message: String,
    },

    /// A query succeeded but returned zero rows.
    #[error("no data (request {request_id})")]
    NoData {
        /// Correlation id of the query.
        request_id: String,
    },

    /// A registry was configured with both an allow-list and a deny-list.
    #[error("configuration conflict: {message}")]
    ConfigConflict {
        /// Description of the conflict.
        message: String,
    },

    /// The requested resource was not found.
    #[error("not found: {resource_type} {id}")]
    NotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A deletion was refused because other definitions still depend on the target.
    #[error("deletion blocked: {message}")]
    DeletionBlocked {
        /// Description naming the dependents.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing the catalog snapshot failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a range violation for a query that starts before the allowed lookback.
    #[must_use]
    pub fn lookback_exceeded(earliest: NaiveDate, from: NaiveDate, to: NaiveDate) -> Self {
        Self::RangeViolation {
            message: format!("Earliest date available: {earliest}. You selected {from} to {to}"),
        }
    }

    /// Creates a range violation for a query that spans more than the allowed window.
    #[must_use]
    pub fn window_exceeded(max_window_days: u32, selected_days: i64) -> Self {
        Self::RangeViolation {
            message: format!(
                "Maximum allowed time span: {max_window_days} days. You selected {selected_days} days"
            ),
        }
    }

    /// Creates a remote-unavailable error without an HTTP status.
    #[must_use]
    pub fn remote_unavailable(
        registry: impl Into<String>,
        request_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteUnavailable {
            registry: registry.into(),
            request_id: request_id.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Creates an invalid-remote-data error.
    #[must_use]
    pub fn remote_data_invalid(
        registry: impl Into<String>,
        request_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteDataInvalid {
            registry: registry.into(),
            request_id: request_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new resource not found error.
    #[must_use]
    pub fn not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Returns true when retrying the same call may succeed without any upstream fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    /// Returns true for the distinguished empty-result condition.
    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Returns true for user-correctable lookback/window violations.
    #[must_use]
    pub const fn is_range_violation(&self) -> bool {
        matches!(self, Self::RangeViolation { .. })
    }
}
