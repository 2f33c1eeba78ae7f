//! The metadata sync engine.
//!
//! A refresh pass for one registry:
//!
//! 1. Lists the remote cubes and applies the allow/deny rule.
//! 2. Deletes local cubes that are no longer exposed (with their columns,
//!    metrics and policy rows).
//! 3. Syncs every exposed cube with bounded concurrency. A failing cube is
//!    recorded in the report and does not stop its siblings.
//! 4. Stamps the registry's `metadata_last_refreshed`.
//!
//! Each cube's catalog writes are applied in a single transaction, so a
//! cube is either fully updated from its document or left as it was.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::Instrument;

use strata_catalog::{
    AggregationFlags, Catalog, CatalogTables, ColumnId, CubeId, CubeRemoval, Registry, RegistryId,
};
use strata_core::observability::sync_span;
use strata_core::{Config, Error, RequestContext, Result};
use strata_remote::{CubeDocument, RemoteSchema};

use crate::exposure::{ExposedCubes, resolve_exposure};
use crate::generate::{generate_column_metrics, regenerate_metrics};
use crate::health;
use crate::metrics as sync_metrics;

// ============================================================================
// Reports
// ============================================================================

/// What one cube sync changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CubeSyncSummary {
    /// Cube name.
    pub cube: String,
    /// Cube id.
    pub cube_id: CubeId,
    /// Whether the cube row was created by this sync.
    pub created: bool,
    /// Columns present after the sync.
    pub columns: usize,
    /// Columns deleted because the remote no longer lists them.
    pub columns_removed: Vec<String>,
    /// Metrics inserted by generation.
    pub metrics_created: usize,
    /// Metrics deleted because their name is no longer a remote field.
    pub metrics_removed: Vec<String>,
    /// Policy rows present after the sync.
    pub lookbacks: usize,
}

/// Result of syncing one exposed cube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CubeOutcome {
    /// The cube was synced.
    Synced(CubeSyncSummary),
    /// The cube's sync failed; the catalog still holds its previous state.
    Failed {
        /// Cube name.
        cube: String,
        /// Error description.
        error: String,
        /// Whether retrying may succeed without an upstream fix.
        retryable: bool,
    },
}

impl CubeOutcome {
    /// Cube name.
    #[must_use]
    pub fn cube(&self) -> &str {
        match self {
            Self::Synced(summary) => &summary.cube,
            Self::Failed { cube, .. } => cube,
        }
    }

    /// Whether the sync succeeded.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}

/// Report of a registry refresh pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    /// Registry name.
    pub registry: String,
    /// Registry id.
    pub registry_id: RegistryId,
    /// Exposed cubes and warnings.
    pub exposed: ExposedCubes,
    /// Cubes deleted because they are no longer exposed.
    pub pruned: Vec<CubeRemoval>,
    /// One outcome per exposed cube, in exposure order.
    pub cubes: Vec<CubeOutcome>,
    /// Time stamped on the registry at the end of the pass.
    pub refreshed_at: DateTime<Utc>,
}

impl RefreshReport {
    /// Outcomes of the cubes that failed.
    #[must_use]
    pub fn failures(&self) -> Vec<&CubeOutcome> {
        self.cubes.iter().filter(|c| !c.is_synced()).collect()
    }

    /// Whether every exposed cube synced.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cubes.iter().all(CubeOutcome::is_synced)
    }
}

/// Outcome of one registry within [`SyncEngine::refresh_all`].
#[derive(Debug)]
pub struct RegistryRefresh {
    /// Registry name.
    pub registry: String,
    /// The pass report, or the error that stopped the pass.
    pub result: Result<RefreshReport>,
}

// ============================================================================
// Engine
// ============================================================================

/// Reconciles the catalog against the remote registries.
#[derive(Clone)]
pub struct SyncEngine {
    catalog: Arc<Catalog>,
    remote: Arc<dyn RemoteSchema>,
    config: Config,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("remote", &"RemoteSchema")
            .field("sync_concurrency", &self.config.sync_concurrency)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine over a catalog and a remote.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, remote: Arc<dyn RemoteSchema>, config: Config) -> Self {
        Self {
            catalog,
            remote,
            config,
        }
    }

    /// The catalog this engine writes to.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn context(&self) -> RequestContext {
        RequestContext::new(self.config.caller_identity.clone())
    }

    fn load_registry(&self, id: RegistryId) -> Result<Registry> {
        self.catalog
            .read(|t| t.registry(id).cloned())?
            .ok_or_else(|| Error::not_found("registry", id))
    }

    /// Lists the remote cubes and applies the registry's allow/deny rule.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the cube list cannot be fetched.
    pub async fn resolve_exposed_cubes(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
    ) -> Result<ExposedCubes> {
        let remote = self.remote.list_cubes(ctx, registry).await?;
        let exposed = resolve_exposure(&registry.exposure, &remote, &registry.exposed_schema);
        for warning in &exposed.warnings {
            tracing::warn!(registry = %registry.name, request_id = %ctx.request_id(), "{warning}");
        }
        Ok(exposed)
    }

    /// Runs a refresh pass for one registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is unknown, the cube list cannot be
    /// fetched, or the catalog cannot be written. Per-cube failures are
    /// reported in [`RefreshReport::cubes`] instead.
    pub async fn refresh_registry(&self, registry_id: RegistryId) -> Result<RefreshReport> {
        let registry = self.load_registry(registry_id)?;
        let span = sync_span("refresh_registry", &registry.name);
        self.refresh_loaded(registry).instrument(span).await
    }

    async fn refresh_loaded(&self, registry: Registry) -> Result<RefreshReport> {
        let start = Instant::now();
        let ctx = self.context();
        tracing::info!(request_id = %ctx.request_id(), "starting registry refresh");

        let exposed = self.resolve_exposed_cubes(&ctx, &registry).await?;

        let pruned = self.catalog.transaction(|t| {
            let doomed: Vec<CubeId> = t
                .cubes_for_registry(registry.id)
                .filter(|c| !exposed.contains(&c.name))
                .map(|c| c.id)
                .collect();
            doomed
                .into_iter()
                .map(|id| t.remove_cube(id))
                .collect::<Result<Vec<_>>>()
        })?;
        for removal in &pruned {
            tracing::info!(
                cube = %removal.cube_name,
                columns = removal.columns,
                metrics = removal.metrics,
                lookbacks = removal.lookbacks,
                "deleted cube no longer exposed"
            );
        }
        sync_metrics::record_cubes_pruned(&registry.name, pruned.len());

        let registry_ref = &registry;
        let cubes: Vec<CubeOutcome> = stream::iter(exposed.cubes.iter())
            .map(|name| {
                let ctx = ctx.child();
                async move {
                    match self.sync_cube(&ctx, registry_ref, name).await {
                        Ok(summary) => {
                            sync_metrics::record_cube_synced(&registry_ref.name, true);
                            CubeOutcome::Synced(summary)
                        }
                        Err(e) => {
                            tracing::error!(
                                cube = %name,
                                request_id = %ctx.request_id(),
                                error = %e,
                                "cube sync failed"
                            );
                            sync_metrics::record_cube_synced(&registry_ref.name, false);
                            CubeOutcome::Failed {
                                cube: name.clone(),
                                error: e.to_string(),
                                retryable: e.is_retryable(),
                            }
                        }
                    }
                }
            })
            .buffered(self.config.sync_concurrency.max(1))
            .collect()
            .await;

        let refreshed_at = Utc::now();
        self.catalog
            .transaction(|t| t.mark_refreshed(registry.id, refreshed_at))?;

        let duration_secs = start.elapsed().as_secs_f64();
        sync_metrics::record_refresh_duration(&registry.name, duration_secs);
        let failed = cubes.iter().filter(|c| !c.is_synced()).count();
        tracing::info!(
            exposed = exposed.cubes.len(),
            pruned = pruned.len(),
            failed,
            duration_secs,
            "registry refresh completed"
        );

        Ok(RefreshReport {
            registry: registry.name.clone(),
            registry_id: registry.id,
            exposed,
            pruned,
            cubes,
            refreshed_at,
        })
    }

    /// Refreshes every registry concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error only if the registry list cannot be read. Failures of
    /// individual registries are returned in their [`RegistryRefresh`].
    pub async fn refresh_all(&self) -> Result<Vec<RegistryRefresh>> {
        let registries: Vec<(RegistryId, String)> = self
            .catalog
            .read(|t| t.registries().map(|r| (r.id, r.name.clone())).collect())?;

        let refreshes = registries.into_iter().map(|(id, name)| async move {
            let result = self.refresh_registry(id).await;
            if let Err(e) = &result {
                tracing::error!(registry = %name, error = %e, "registry refresh failed");
            }
            RegistryRefresh {
                registry: name,
                result,
            }
        });
        Ok(futures::future::join_all(refreshes).await)
    }

    /// Syncs one cube of a registry from its remote document.
    ///
    /// The document is fetched at the cube's current revision (0 for a cube
    /// not yet in the catalog). The cube row is created, reassigned and
    /// updated in one transaction after a successful fetch.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the document cannot be fetched, or a
    /// catalog error if it cannot be applied.
    pub async fn sync_cube(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_name: &str,
    ) -> Result<CubeSyncSummary> {
        let cube_version = self
            .catalog
            .read(|t| t.find_cube(registry.id, cube_name).map(|c| c.cube_version))?
            .unwrap_or(0);

        tracing::debug!(cube = cube_name, cube_version, request_id = %ctx.request_id(), "fetching cube");
        let document = self
            .remote
            .fetch_cube(ctx, registry, cube_name, cube_version)
            .await?;

        let summary = self
            .catalog
            .transaction(|t| apply_cube_document(t, registry.id, cube_name, &document))?;

        tracing::info!(
            cube = cube_name,
            created = summary.created,
            columns = summary.columns,
            metrics_created = summary.metrics_created,
            lookbacks = summary.lookbacks,
            "synced cube"
        );
        Ok(summary)
    }

    /// Re-runs metric generation for a cube.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn regenerate_metrics(&self, cube_id: CubeId) -> Result<usize> {
        self.catalog.transaction(|t| regenerate_metrics(t, cube_id))
    }

    /// Replaces a column's capability flags and generates the metrics they imply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown column.
    pub fn set_column_flags(&self, column_id: ColumnId, flags: AggregationFlags) -> Result<usize> {
        self.catalog.transaction(|t| {
            t.update_column_flags(column_id, flags)?;
            generate_column_metrics(t, column_id)
        })
    }

    /// Probes a registry; returns `"OK"` or a failure description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown registry. Remote failures
    /// are reported in the returned string.
    pub async fn registry_status(&self, registry_id: RegistryId) -> Result<String> {
        let registry = self.load_registry(registry_id)?;
        let ctx = self.context();
        Ok(health::registry_status(self.remote.as_ref(), &ctx, &registry).await)
    }
}

/// Applies a fetched cube document to the catalog.
///
/// Order matters: policy rows are replaced first, then each field's column
/// is upserted before its metrics are generated, then columns and metrics
/// whose names left the field list are deleted.
///
/// # Errors
///
/// Returns a catalog error for unknown rows or invalid names.
pub fn apply_cube_document(
    tables: &mut CatalogTables,
    registry_id: RegistryId,
    cube_name: &str,
    document: &CubeDocument,
) -> Result<CubeSyncSummary> {
    let created = tables.find_cube(registry_id, cube_name).is_none();
    let cube_id = tables.ensure_cube(registry_id, cube_name)?;
    tables.assign_cube(cube_id, registry_id)?;
    tables.set_cube_schema(cube_id, document.main_entity_ids.clone())?;

    tables.replace_lookbacks(
        cube_id,
        document.max_days_look_back.as_deref(),
        document.max_days_window.as_deref(),
    )?;

    let mut metrics_created = 0;
    for field in &document.fields {
        let column_id = tables.upsert_column(cube_id, field.to_column_update())?;
        metrics_created += generate_column_metrics(tables, column_id)?;
    }

    let field_names = document.field_names();
    let columns_removed = tables.retain_columns(cube_id, &field_names);
    let metrics_removed = tables.retain_metrics(cube_id, &field_names);
    for name in &columns_removed {
        tracing::debug!(cube = cube_name, column = %name, "deleted column");
    }
    for name in &metrics_removed {
        tracing::debug!(cube = cube_name, metric = %name, "deleted metric");
    }

    Ok(CubeSyncSummary {
        cube: cube_name.to_string(),
        cube_id,
        created,
        columns: tables.columns_for_cube(cube_id).count(),
        columns_removed,
        metrics_created,
        metrics_removed,
        lookbacks: tables.lookbacks_for_cube(cube_id).count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_catalog::{Grain, RegistrySpec, RequestType};

    fn tables_with_registry() -> (CatalogTables, RegistryId) {
        let mut tables = CatalogTables::new();
        let id = tables
            .insert_registry(RegistrySpec {
                name: "prod".into(),
                host: "remote.test".into(),
                port: 80,
                base_path: "api".into(),
                domain_endpoint: "domain".into(),
                sync_request_endpoint: "sync".into(),
                exposed_schema: "reporting".into(),
                allow_list: None,
                deny_list: None,
                cache_timeout: None,
            })
            .unwrap();
        (tables, id)
    }

    fn document(value: serde_json::Value) -> CubeDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn apply_creates_cube_columns_metrics_and_policies() {
        let (mut tables, registry) = tables_with_registry();
        let doc = document(serde_json::json!({
            "mainEntityIds": {"advertiser": "Advertiser ID"},
            "maxDaysLookBack": [{"requestType": "SyncRequest", "grain": "DailyGrain", "days": 30}],
            "maxDaysWindow": [{"requestType": "SyncRequest", "grain": "DailyGrain", "days": 20}],
            "fields": [
                {"field": "Day", "type": "Dimension", "dataType": {"type": "Date"}, "filterable": 1},
                {"field": "Clicks", "type": "Fact", "dataType": {"type": "Integer"},
                 "filterable": 1, "rollupExpression": "SumRollup"}
            ]
        }));

        let summary = apply_cube_document(&mut tables, registry, "stats", &doc).unwrap();
        assert!(summary.created);
        assert_eq!(summary.columns, 2);
        assert_eq!(summary.metrics_created, 1);
        assert_eq!(summary.lookbacks, 2);

        let cube = tables.cube(summary.cube_id).unwrap();
        assert_eq!(cube.schema, vec!["advertiser"]);
        let all = tables
            .lookback(summary.cube_id, RequestType::SyncRequest, Grain::All)
            .unwrap();
        assert_eq!(all.lookback_days, Some(30));
        assert_eq!(all.max_window, Some(20));

        let day = tables.find_column(summary.cube_id, "Day").unwrap();
        assert!(day.flags.groupby);
        let clicks = tables.find_column(summary.cube_id, "Clicks").unwrap();
        assert!(clicks.flags.sum);
    }

    #[test]
    fn empty_field_list_clears_columns_and_metrics() {
        let (mut tables, registry) = tables_with_registry();
        let full = document(serde_json::json!({
            "fields": [{"field": "Clicks", "type": "Fact", "filterable": true}]
        }));
        let summary = apply_cube_document(&mut tables, registry, "stats", &full).unwrap();
        assert_eq!(summary.columns, 1);

        let empty = document(serde_json::json!({"fields": []}));
        let summary = apply_cube_document(&mut tables, registry, "stats", &empty).unwrap();
        assert!(!summary.created);
        assert_eq!(summary.columns, 0);
        assert_eq!(summary.columns_removed, vec!["Clicks"]);
        assert_eq!(summary.metrics_removed, vec!["Clicks"]);
    }

    #[test]
    fn missing_window_array_drops_all_policies() {
        let (mut tables, registry) = tables_with_registry();
        let with_policies = document(serde_json::json!({
            "maxDaysLookBack": [{"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 7}],
            "maxDaysWindow": [{"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 3}],
            "fields": []
        }));
        let summary = apply_cube_document(&mut tables, registry, "stats", &with_policies).unwrap();
        assert_eq!(summary.lookbacks, 1);

        let lookback_only = document(serde_json::json!({
            "maxDaysLookBack": [{"requestType": "SyncRequest", "grain": "HourlyGrain", "days": 7}],
            "fields": []
        }));
        let summary = apply_cube_document(&mut tables, registry, "stats", &lookback_only).unwrap();
        assert_eq!(summary.lookbacks, 0);
    }
}
