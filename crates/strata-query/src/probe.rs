//! Cube health probe.
//!
//! Fetches the cube document, then runs a two-day query on the cube's first
//! metric at the grain of its first interactive policy row. The rows go
//! through the normalizer, so null Hour/Day values fail the probe while an
//! empty result does not. Like the
//! registry probe, the outcome is always a string.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

use strata_catalog::{Grain, Registry};
use strata_core::{Error, RequestContext, Result};
use strata_remote::RemoteSchema;

use crate::compiler::{CompilerSettings, compile};
use crate::normalizer::{NormalizeContext, normalize};
use crate::policy::PolicyView;
use crate::request::QueryRequest;

/// Status string for a healthy cube.
pub const STATUS_OK: &str = "OK";

/// Catalog facts the probe needs about one cube.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'a> {
    /// Owning registry.
    pub registry: &'a Registry,
    /// Cube name.
    pub cube_name: &'a str,
    /// Revision sent with remote calls.
    pub cube_version: u32,
    /// First catalogued metric, queried by the probe.
    pub first_metric: Option<&'a str>,
    /// Grain of the cube's first `SyncRequest` policy row.
    pub probe_grain: Option<Grain>,
    /// Policy the probe query is compiled under.
    pub policy: &'a PolicyView,
    /// Whether the cube's `Hour` values skip normalization.
    pub hour_passthrough: bool,
}

/// Granularity the probe queries at, if any.
///
/// Minute-grain cubes and cubes without an interactive policy row are not
/// queried.
#[must_use]
pub fn probe_granularity(grain: Option<Grain>) -> Option<&'static str> {
    match grain? {
        Grain::DailyGrain => Some("1 day"),
        Grain::HourlyGrain => Some("1 hour"),
        Grain::All => Some("all"),
        Grain::MinuteGrain => None,
    }
}

/// Probes one cube; returns [`STATUS_OK`] or a description of the failure.
pub async fn cube_status(
    remote: &dyn RemoteSchema,
    ctx: &RequestContext,
    target: &ProbeTarget<'_>,
    now: NaiveDateTime,
    settings: &CompilerSettings,
) -> String {
    let qualified = format!("{}.{}", target.registry.name, target.cube_name);

    if let Err(e) = remote
        .fetch_cube(ctx, target.registry, target.cube_name, target.cube_version)
        .await
    {
        tracing::warn!(cube = %qualified, request_id = %ctx.request_id(), error = %e, "cube document fetch failed");
        return match e {
            Error::RemoteUnavailable {
                status: Some(status),
                message,
                ..
            } => format!("Request failed: {status}, {message}"),
            Error::RemoteDataInvalid { .. } => format!("No data from cube: {qualified}"),
            other => format!("Exception when requesting cube {qualified}: {other}"),
        };
    }

    let Some(granularity) = probe_granularity(target.probe_grain) else {
        return STATUS_OK.to_string();
    };

    let outcome = probe_query(remote, ctx, target, granularity, now, settings).await;
    match outcome {
        Ok(()) => STATUS_OK.to_string(),
        Err(e) if e.is_no_data() => STATUS_OK.to_string(),
        Err(e) => {
            tracing::warn!(cube = %qualified, request_id = %ctx.request_id(), error = %e, "cube probe query failed");
            format!("Exception when requesting cube {qualified}: {e}")
        }
    }
}

/// Two-day query on the first metric, normalized like any other result.
async fn probe_query(
    remote: &dyn RemoteSchema,
    ctx: &RequestContext,
    target: &ProbeTarget<'_>,
    granularity: &str,
    now: NaiveDateTime,
    settings: &CompilerSettings,
) -> Result<()> {
    let today = now.date().and_time(NaiveTime::MIN);
    let mut request = QueryRequest::new(granularity, today - TimeDelta::days(2), today);
    request.metrics = target.first_metric.map(str::to_string).into_iter().collect();

    let compiled = compile(target.cube_name, target.policy, &request, now, settings)?;
    let response = remote
        .execute(ctx, target.registry, target.cube_version, &compiled.document)
        .await?;
    let normalize_ctx = NormalizeContext {
        grain: compiled.grain,
        is_timeseries: request.is_timeseries,
        groupby: &request.groupby,
        hour_passthrough: target.hour_passthrough,
        registry: &target.registry.name,
        request_id: ctx.request_id(),
    };
    normalize(response, &normalize_ctx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_granularity_follows_policy_grain() {
        assert_eq!(probe_granularity(Some(Grain::DailyGrain)), Some("1 day"));
        assert_eq!(probe_granularity(Some(Grain::HourlyGrain)), Some("1 hour"));
        assert_eq!(probe_granularity(Some(Grain::All)), Some("all"));
        assert_eq!(probe_granularity(Some(Grain::MinuteGrain)), None);
        assert_eq!(probe_granularity(None), None);
    }
}
