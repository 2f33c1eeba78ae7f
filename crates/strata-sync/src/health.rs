//! Registry health probe.
//!
//! A diagnostic, not part of any sync: the outcome is always a string.

use strata_catalog::Registry;
use strata_core::{Error, RequestContext};
use strata_remote::RemoteSchema;

/// Status string for a healthy registry.
pub const STATUS_OK: &str = "OK";

/// Pings the registry, then lists its cubes.
///
/// Returns [`STATUS_OK`] or a description of the first failure.
pub async fn registry_status(
    remote: &dyn RemoteSchema,
    ctx: &RequestContext,
    registry: &Registry,
) -> String {
    let name = &registry.name;
    if let Err(e) = remote.ping(ctx, registry).await {
        tracing::warn!(registry = %name, request_id = %ctx.request_id(), error = %e, "registry ping failed");
        return match e {
            Error::RemoteUnavailable {
                status: Some(status),
                message,
                ..
            } => format!("Exception when request registry {name}: {status}, {message}"),
            Error::RemoteDataInvalid { .. } => format!("No data from registry: {name}"),
            other => format!("Exception when requesting registry {name}: {other}"),
        };
    }

    if let Err(e) = remote.list_cubes(ctx, registry).await {
        tracing::warn!(registry = %name, request_id = %ctx.request_id(), error = %e, "listing cubes failed");
        return format!("Exception when getting cubes from registry {name}: {e}");
    }

    STATUS_OK.to_string()
}
