//! Per-call request context for remote traffic.
//!
//! Every call to the remote service carries a correlation id and the identity
//! of the caller. The context is created by whoever initiates the work (a sync
//! pass, an incoming query) and handed down explicitly; nothing is read from
//! ambient or thread-local state.

use std::fmt;

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Header carrying the caller identity.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Correlation id and caller identity attached to remote requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    caller_identity: String,
}

impl RequestContext {
    /// Creates a context with a freshly generated request id.
    #[must_use]
    pub fn new(caller_identity: impl Into<String>) -> Self {
        Self {
            request_id: ulid::Ulid::new().to_string(),
            caller_identity: caller_identity.into(),
        }
    }

    /// Creates a context with an explicit request id (propagated from upstream).
    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>, caller_identity: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            caller_identity: caller_identity.into(),
        }
    }

    /// Returns a new context for the same caller with a fresh request id.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::new(self.caller_identity.clone())
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn caller_identity(&self) -> &str {
        &self.caller_identity
    }

    /// Returns the identity headers as name/value pairs.
    #[must_use]
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (REQUEST_ID_HEADER, self.request_id.as_str()),
            (USER_ID_HEADER, self.caller_identity.as_str()),
        ]
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RID: {}", self.request_id)
    }
}
