//! The query service: resolve, compile, execute, normalize.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use strata_catalog::{Catalog, CubeId, Registry, RegistryId, RequestType};
use strata_core::observability::query_span;
use strata_core::{Config, Error, RequestContext, Result};
use strata_remote::RemoteSchema;

use crate::compiler::{CompiledQuery, CompilerSettings, compile};
use crate::metrics as query_metrics;
use crate::normalizer::{NormalizeContext, ResultSet, normalize};
use crate::policy::PolicyView;
use crate::probe::{self, ProbeTarget};
use crate::request::QueryRequest;

/// A normalized result and what produced it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Normalized rows.
    pub result_set: ResultSet,
    /// Compiled query text as posted.
    pub query: String,
    /// Time spent waiting on the remote.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Correlation id of the remote call.
    pub request_id: String,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Everything the service reads from the catalog for one query.
struct Target {
    registry: Registry,
    cube_name: String,
    cube_version: u32,
    policy: PolicyView,
}

/// Compiles and runs queries against catalogued cubes.
#[derive(Clone)]
pub struct QueryService {
    catalog: Arc<Catalog>,
    remote: Arc<dyn RemoteSchema>,
    config: Config,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("remote", &"RemoteSchema")
            .field("row_limit_ceiling", &self.config.row_limit_ceiling)
            .finish_non_exhaustive()
    }
}

impl QueryService {
    /// Creates a service over a catalog and a remote.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, remote: Arc<dyn RemoteSchema>, config: Config) -> Self {
        Self {
            catalog,
            remote,
            config,
        }
    }

    fn settings(&self) -> CompilerSettings {
        CompilerSettings::from_config(&self.config)
    }

    fn hour_passthrough(&self, cube_name: &str) -> bool {
        self.config
            .hour_passthrough_cubes
            .iter()
            .any(|c| c == cube_name)
    }

    fn target(&self, cube_id: CubeId) -> Result<Target> {
        self.catalog.read(|t| {
            let cube = t.cube(cube_id).ok_or_else(|| Error::not_found("cube", cube_id))?;
            let registry = t
                .registry(cube.registry_id)
                .cloned()
                .ok_or_else(|| Error::not_found("registry", cube.registry_id))?;
            Ok(Target {
                registry,
                cube_name: cube.name.clone(),
                cube_version: cube.cube_version,
                policy: PolicyView::for_cube(t, cube_id),
            })
        })?
    }

    /// Compiles a request for a catalogued cube without executing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube, otherwise whatever
    /// [`compile`] returns.
    pub fn compile(
        &self,
        cube_id: CubeId,
        request: &QueryRequest,
        query_start: NaiveDateTime,
    ) -> Result<CompiledQuery> {
        let target = self.target(cube_id)?;
        compile_recorded(&target.cube_name, &target.policy, request, query_start, &self.settings())
    }

    /// Runs a request with the current time as the query start.
    ///
    /// # Errors
    ///
    /// See [`QueryService::run_at`].
    pub async fn run(
        &self,
        ctx: &RequestContext,
        cube_id: CubeId,
        request: &QueryRequest,
    ) -> Result<QueryResult> {
        self.run_at(ctx, cube_id, request, Utc::now().naive_utc()).await
    }

    /// Compiles, executes and normalizes a request.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown cube
    /// - [`Error::RangeViolation`] or [`Error::InvalidInput`] from compilation;
    ///   nothing is sent to the remote in that case
    /// - [`Error::RemoteUnavailable`] or [`Error::RemoteDataInvalid`] from the
    ///   remote call or the normalizer
    /// - [`Error::NoData`] when the query returns no rows
    pub async fn run_at(
        &self,
        ctx: &RequestContext,
        cube_id: CubeId,
        request: &QueryRequest,
        query_start: NaiveDateTime,
    ) -> Result<QueryResult> {
        let target = self.target(cube_id)?;
        let span = query_span("run", &target.cube_name, ctx.request_id());
        self.run_target(ctx, target, request, query_start)
            .instrument(span)
            .await
    }

    async fn run_target(
        &self,
        ctx: &RequestContext,
        target: Target,
        request: &QueryRequest,
        query_start: NaiveDateTime,
    ) -> Result<QueryResult> {
        let compiled = compile_recorded(
            &target.cube_name,
            &target.policy,
            request,
            query_start,
            &self.settings(),
        )?;

        let start = Instant::now();
        let response = self
            .remote
            .execute(ctx, &target.registry, target.cube_version, &compiled.document)
            .await?;
        let duration = start.elapsed();
        query_metrics::record_query_duration(&target.cube_name, duration.as_secs_f64());
        tracing::info!(rows = response.rows.len(), elapsed_ms = duration.as_millis(), "query executed");

        let normalize_ctx = NormalizeContext {
            grain: compiled.grain,
            is_timeseries: request.is_timeseries,
            groupby: &request.groupby,
            hour_passthrough: self.hour_passthrough(&target.cube_name),
            registry: &target.registry.name,
            request_id: ctx.request_id(),
        };
        let result_set = normalize(response, &normalize_ctx).inspect_err(|e| {
            if e.is_no_data() {
                query_metrics::record_no_data(&target.cube_name);
            }
        })?;

        Ok(QueryResult {
            result_set,
            query: compiled.to_json(),
            duration,
            request_id: ctx.request_id().to_string(),
        })
    }

    /// Probes a cube the way a health check would.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown registry. Probe failures
    /// are reported in the returned string.
    pub async fn cube_status(
        &self,
        ctx: &RequestContext,
        registry_id: RegistryId,
        cube_name: &str,
    ) -> Result<String> {
        let (registry, target) = self.catalog.read(|t| {
            let registry = t
                .registry(registry_id)
                .cloned()
                .ok_or_else(|| Error::not_found("registry", registry_id))?;
            let target = t.find_cube(registry_id, cube_name).map(|cube| {
                let first_metric = t.metrics_for_cube(cube.id).next().map(|m| m.name.clone());
                let probe_grain = t
                    .lookbacks_for_cube(cube.id)
                    .find(|l| l.request_type == RequestType::SyncRequest)
                    .map(|l| l.grain);
                (cube.cube_version, first_metric, probe_grain, PolicyView::for_cube(t, cube.id))
            });
            Ok::<_, Error>((registry, target))
        })??;
        let Some((cube_version, first_metric, probe_grain, policy)) = target else {
            return Ok(format!("Cube '{cube_name}' not found"));
        };
        let probe_target = ProbeTarget {
            registry: &registry,
            cube_name,
            cube_version,
            first_metric: first_metric.as_deref(),
            probe_grain,
            policy: &policy,
            hour_passthrough: self.hour_passthrough(cube_name),
        };
        Ok(probe::cube_status(
            self.remote.as_ref(),
            ctx,
            &probe_target,
            Utc::now().naive_utc(),
            &self.settings(),
        )
        .await)
    }
}

fn compile_recorded(
    cube_name: &str,
    policy: &PolicyView,
    request: &QueryRequest,
    query_start: NaiveDateTime,
    settings: &CompilerSettings,
) -> Result<CompiledQuery> {
    compile(cube_name, policy, request, query_start, settings).inspect_err(|e| match e {
        Error::RangeViolation { .. } => query_metrics::record_rejection("range"),
        Error::InvalidInput(_) => query_metrics::record_rejection("invalid_input"),
        _ => {}
    })
}
