//! Arena storage for catalog rows.
//!
//! Each entity lives in its own id-keyed table. Ownership is expressed only
//! through foreign-key fields (`registry_id`, `cube_id`); deleting an owner
//! enumerates its dependents by scanning those fields and removes them in the
//! same call. There are no back-references.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use strata_core::{Error, Result};

use crate::column::{AggregationFlags, Column, ColumnUpdate};
use crate::cube::Cube;
use crate::dependents::DependentReports;
use crate::id::{ColumnId, CubeId, IdSequences, LookbackId, MetricId, RegistryId};
use crate::lookback::{Grain, Lookback, PolicyEntry, PolicyLimit, RequestType};
use crate::metric::{Metric, NewMetric};
use crate::registry::{Registry, RegistrySpec};

/// Rows removed by a cascading cube delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CubeRemoval {
    /// Name of the removed cube.
    pub cube_name: String,
    /// Number of columns removed with it.
    pub columns: usize,
    /// Number of metrics removed with it.
    pub metrics: usize,
    /// Number of lookback rows removed with it.
    pub lookbacks: usize,
}

/// All catalog tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogTables {
    pub(crate) sequences: IdSequences,
    pub(crate) registries: BTreeMap<RegistryId, Registry>,
    pub(crate) cubes: BTreeMap<CubeId, Cube>,
    pub(crate) columns: BTreeMap<ColumnId, Column>,
    pub(crate) metrics: BTreeMap<MetricId, Metric>,
    pub(crate) lookbacks: BTreeMap<LookbackId, Lookback>,
}

impl CatalogTables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    /// Inserts a registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigConflict`] when both cube lists are set and
    /// [`Error::InvalidInput`] when the name is empty or already taken.
    pub fn insert_registry(&mut self, spec: RegistrySpec) -> Result<RegistryId> {
        if self.registry_by_name(spec.name.trim()).is_some() {
            return Err(Error::InvalidInput(format!(
                "registry '{}' already exists",
                spec.name.trim()
            )));
        }
        let id = self.sequences.next_registry();
        let registry = Registry::new(id, spec)?;
        self.registries.insert(id, registry);
        Ok(id)
    }

    /// Replaces a registry's definition and recomputes its cubes' permission strings.
    ///
    /// # Errors
    ///
    /// Same as [`Self::insert_registry`], plus [`Error::NotFound`].
    pub fn update_registry(&mut self, id: RegistryId, spec: RegistrySpec) -> Result<()> {
        if self
            .registry_by_name(spec.name.trim())
            .is_some_and(|other| other.id != id)
        {
            return Err(Error::InvalidInput(format!(
                "registry '{}' already exists",
                spec.name.trim()
            )));
        }
        let registry = self
            .registries
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("registry", id))?;
        registry.apply(spec)?;

        let name = registry.name.clone();
        for cube in self.cubes.values_mut().filter(|c| c.registry_id == id) {
            cube.perm = Cube::perm_for(&name, &cube.name, cube.id);
        }
        Ok(())
    }

    /// Looks up a registry by id.
    #[must_use]
    pub fn registry(&self, id: RegistryId) -> Option<&Registry> {
        self.registries.get(&id)
    }

    /// Looks up a registry by name.
    #[must_use]
    pub fn registry_by_name(&self, name: &str) -> Option<&Registry> {
        self.registries.values().find(|r| r.name == name)
    }

    /// Iterates registries in id order.
    pub fn registries(&self) -> impl Iterator<Item = &Registry> {
        self.registries.values()
    }

    /// Records the completion time of a refresh pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown registry.
    pub fn mark_refreshed(&mut self, id: RegistryId, at: DateTime<Utc>) -> Result<()> {
        let registry = self
            .registries
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("registry", id))?;
        registry.metadata_last_refreshed = Some(at);
        Ok(())
    }

    /// Deletes a registry and all of its cubes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeletionBlocked`] if any report references one of the
    /// registry's cubes; nothing is removed in that case.
    pub fn delete_registry(
        &mut self,
        id: RegistryId,
        reports: &dyn DependentReports,
    ) -> Result<Vec<CubeRemoval>> {
        let registry = self
            .registries
            .get(&id)
            .ok_or_else(|| Error::not_found("registry", id))?;

        let blockers: Vec<String> = self
            .cubes_for_registry(id)
            .filter_map(|cube| {
                let count = reports.reports_referencing(cube.id);
                (count > 0).then(|| {
                    format!("{count} report(s) reference {}", cube.full_name(&registry.name))
                })
            })
            .collect();
        if !blockers.is_empty() {
            return Err(Error::DeletionBlocked {
                message: format!(
                    "registry '{}' cannot be deleted: {}",
                    registry.name,
                    blockers.join("; ")
                ),
            });
        }

        let cube_ids: Vec<CubeId> = self.cubes_for_registry(id).map(|c| c.id).collect();
        let mut removed = Vec::with_capacity(cube_ids.len());
        for cube_id in cube_ids {
            removed.push(self.remove_cube(cube_id)?);
        }
        self.registries.remove(&id);
        tracing::debug!(registry = %id, cubes = removed.len(), "deleted registry");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Cubes
    // ------------------------------------------------------------------

    /// Looks up a cube by id.
    #[must_use]
    pub fn cube(&self, id: CubeId) -> Option<&Cube> {
        self.cubes.get(&id)
    }

    /// Looks up a cube by its `(registry, name)` identity.
    #[must_use]
    pub fn find_cube(&self, registry_id: RegistryId, name: &str) -> Option<&Cube> {
        self.cubes
            .values()
            .find(|c| c.registry_id == registry_id && c.name == name)
    }

    /// Iterates all cubes in id order.
    pub fn cubes(&self) -> impl Iterator<Item = &Cube> {
        self.cubes.values()
    }

    /// Iterates a registry's cubes in id order.
    pub fn cubes_for_registry(&self, registry_id: RegistryId) -> impl Iterator<Item = &Cube> {
        self.cubes
            .values()
            .filter(move |c| c.registry_id == registry_id)
    }

    /// `[<registry>].[<cube>]` for a cube, if both rows exist.
    #[must_use]
    pub fn cube_full_name(&self, id: CubeId) -> Option<String> {
        let cube = self.cubes.get(&id)?;
        let registry = self.registries.get(&cube.registry_id)?;
        Some(cube.full_name(&registry.name))
    }

    /// Returns the cube with this identity, creating it if absent.
    ///
    /// A new cube starts at revision 0 with an empty schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown registry or
    /// [`Error::InvalidInput`] for an empty cube name.
    pub fn ensure_cube(&mut self, registry_id: RegistryId, name: &str) -> Result<CubeId> {
        if let Some(cube) = self.find_cube(registry_id, name) {
            return Ok(cube.id);
        }
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("cube name cannot be empty".to_string()));
        }
        let registry = self
            .registries
            .get(&registry_id)
            .ok_or_else(|| Error::not_found("registry", registry_id))?;
        let id = self.sequences.next_cube();
        let cube = Cube {
            id,
            name: name.to_string(),
            registry_id,
            cube_version: 0,
            schema: Vec::new(),
            perm: Cube::perm_for(&registry.name, name, id),
            description: None,
        };
        self.cubes.insert(id, cube);
        tracing::debug!(cube = name, registry = %registry.name, "created cube");
        Ok(id)
    }

    /// Moves a cube to a registry and recomputes its permission string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown rows or [`Error::InvalidInput`]
    /// when the target registry already has a cube with this name.
    pub fn assign_cube(&mut self, cube_id: CubeId, registry_id: RegistryId) -> Result<()> {
        let registry_name = self
            .registries
            .get(&registry_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::not_found("registry", registry_id))?;
        let name = self
            .cubes
            .get(&cube_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::not_found("cube", cube_id))?;
        if self
            .find_cube(registry_id, &name)
            .is_some_and(|other| other.id != cube_id)
        {
            return Err(Error::InvalidInput(format!(
                "registry '{registry_name}' already has a cube named '{name}'"
            )));
        }
        let cube = self.cube_mut(cube_id)?;
        cube.registry_id = registry_id;
        cube.perm = Cube::perm_for(&registry_name, &name, cube_id);
        Ok(())
    }

    /// Replaces a cube's schema descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn set_cube_schema(&mut self, cube_id: CubeId, schema: Vec<String>) -> Result<()> {
        self.cube_mut(cube_id)?.schema = schema;
        Ok(())
    }

    /// Sets a cube's description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn set_cube_description(&mut self, cube_id: CubeId, description: Option<String>) -> Result<()> {
        self.cube_mut(cube_id)?.description = description;
        Ok(())
    }

    /// Increments a cube's revision counter and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn bump_cube_version(&mut self, cube_id: CubeId) -> Result<u32> {
        let cube = self.cube_mut(cube_id)?;
        cube.cube_version = cube.cube_version.wrapping_add(1);
        Ok(cube.cube_version)
    }

    /// Deletes a cube with its columns, metrics and lookbacks, ignoring reports.
    ///
    /// Used by refresh pruning, where the remote no longer serves the cube.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn remove_cube(&mut self, cube_id: CubeId) -> Result<CubeRemoval> {
        let cube = self
            .cubes
            .remove(&cube_id)
            .ok_or_else(|| Error::not_found("cube", cube_id))?;

        let columns = remove_owned(&mut self.columns, |c| c.cube_id == cube_id);
        let metrics = remove_owned(&mut self.metrics, |m| m.cube_id == cube_id);
        let lookbacks = remove_owned(&mut self.lookbacks, |l| l.cube_id == cube_id);
        tracing::debug!(cube = %cube.name, columns, metrics, lookbacks, "removed cube");

        Ok(CubeRemoval {
            cube_name: cube.name,
            columns,
            metrics,
            lookbacks,
        })
    }

    /// Deletes a cube unless reports still reference it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeletionBlocked`] naming the report count and the cube.
    pub fn delete_cube(
        &mut self,
        cube_id: CubeId,
        reports: &dyn DependentReports,
    ) -> Result<CubeRemoval> {
        let count = reports.reports_referencing(cube_id);
        if count > 0 {
            let name = self
                .cube_full_name(cube_id)
                .ok_or_else(|| Error::not_found("cube", cube_id))?;
            return Err(Error::DeletionBlocked {
                message: format!("{count} report(s) reference {name}"),
            });
        }
        self.remove_cube(cube_id)
    }

    fn cube_mut(&mut self, cube_id: CubeId) -> Result<&mut Cube> {
        self.cubes
            .get_mut(&cube_id)
            .ok_or_else(|| Error::not_found("cube", cube_id))
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Looks up a column by id.
    #[must_use]
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(&id)
    }

    /// Looks up a column by `(cube, name)`.
    #[must_use]
    pub fn find_column(&self, cube_id: CubeId, name: &str) -> Option<&Column> {
        self.columns
            .values()
            .find(|c| c.cube_id == cube_id && c.name == name)
    }

    /// Iterates all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Iterates a cube's columns in creation order.
    pub fn columns_for_cube(&self, cube_id: CubeId) -> impl Iterator<Item = &Column> {
        self.columns.values().filter(move |c| c.cube_id == cube_id)
    }

    /// Inserts or updates the column `(cube, update.name)`.
    ///
    /// Kind, data type and `filterable` are overwritten. Declared capabilities
    /// are switched on; capabilities already on stay on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn upsert_column(&mut self, cube_id: CubeId, update: ColumnUpdate) -> Result<ColumnId> {
        if !self.cubes.contains_key(&cube_id) {
            return Err(Error::not_found("cube", cube_id));
        }
        let existing = self.find_column(cube_id, &update.name).map(|c| c.id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.sequences.next_column();
                self.columns.insert(
                    id,
                    Column {
                        id,
                        cube_id,
                        name: update.name.clone(),
                        kind: update.kind,
                        data_type: String::new(),
                        filterable: false,
                        flags: AggregationFlags::default(),
                    },
                );
                id
            }
        };

        let column = self
            .columns
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("column", id))?;
        column.kind = update.kind;
        column.data_type = update.data_type;
        column.filterable = update.filterable;
        let declared = update.declared;
        column.flags.groupby |= declared.groupby;
        column.flags.sum |= declared.sum;
        column.flags.min |= declared.min;
        column.flags.max |= declared.max;
        column.flags.count_distinct |= declared.count_distinct;
        column.normalize();
        Ok(id)
    }

    /// Overwrites a column's capability flags. `Dimension` columns keep `groupby`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown column.
    pub fn update_column_flags(&mut self, id: ColumnId, flags: AggregationFlags) -> Result<()> {
        let column = self
            .columns
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("column", id))?;
        column.flags = flags;
        column.normalize();
        Ok(())
    }

    /// Deletes a cube's columns whose names are not in `keep`; returns the removed names.
    pub fn retain_columns(&mut self, cube_id: CubeId, keep: &[String]) -> Vec<String> {
        let keep: BTreeSet<&str> = keep.iter().map(String::as_str).collect();
        let doomed: Vec<ColumnId> = self
            .columns_for_cube(cube_id)
            .filter(|c| !keep.contains(c.name.as_str()))
            .map(|c| c.id)
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| self.columns.remove(&id))
            .map(|c| c.name)
            .collect()
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Looks up a metric by `(cube, name)`.
    #[must_use]
    pub fn find_metric(&self, cube_id: CubeId, name: &str) -> Option<&Metric> {
        self.metrics
            .values()
            .find(|m| m.cube_id == cube_id && m.name == name)
    }

    /// Iterates all metrics.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.values()
    }

    /// Iterates a cube's metrics in creation order.
    pub fn metrics_for_cube(&self, cube_id: CubeId) -> impl Iterator<Item = &Metric> {
        self.metrics.values().filter(move |m| m.cube_id == cube_id)
    }

    /// Inserts a metric unless one with the same name already exists for the cube.
    ///
    /// Returns the new id, or `None` when an existing metric was left in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn insert_metric_if_absent(
        &mut self,
        cube_id: CubeId,
        metric: NewMetric,
    ) -> Result<Option<MetricId>> {
        if !self.cubes.contains_key(&cube_id) {
            return Err(Error::not_found("cube", cube_id));
        }
        if self.find_metric(cube_id, &metric.name).is_some() {
            return Ok(None);
        }
        let id = self.sequences.next_metric();
        self.metrics.insert(
            id,
            Metric {
                id,
                cube_id,
                name: metric.name,
                verbose_name: metric.verbose_name,
                metric_type: metric.metric_type,
                expression: metric.expression,
            },
        );
        Ok(Some(id))
    }

    /// Deletes a cube's metrics whose names are not in `keep`; returns the removed names.
    pub fn retain_metrics(&mut self, cube_id: CubeId, keep: &[String]) -> Vec<String> {
        let keep: BTreeSet<&str> = keep.iter().map(String::as_str).collect();
        let doomed: Vec<MetricId> = self
            .metrics_for_cube(cube_id)
            .filter(|m| !keep.contains(m.name.as_str()))
            .map(|m| m.id)
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| self.metrics.remove(&id))
            .map(|m| m.name)
            .collect()
    }

    // ------------------------------------------------------------------
    // Lookbacks
    // ------------------------------------------------------------------

    /// Looks up the policy row for `(cube, request_type, grain)`.
    #[must_use]
    pub fn lookback(
        &self,
        cube_id: CubeId,
        request_type: RequestType,
        grain: Grain,
    ) -> Option<&Lookback> {
        self.lookbacks.values().find(|l| {
            l.cube_id == cube_id && l.request_type == request_type && l.grain == grain
        })
    }

    /// Iterates all policy rows.
    pub fn lookbacks(&self) -> impl Iterator<Item = &Lookback> {
        self.lookbacks.values()
    }

    /// Iterates a cube's policy rows in creation order.
    pub fn lookbacks_for_cube(&self, cube_id: CubeId) -> impl Iterator<Item = &Lookback> {
        self.lookbacks.values().filter(move |l| l.cube_id == cube_id)
    }

    /// Sets one limit of a policy row, creating the row if needed.
    ///
    /// A `DailyGrain` write is repeated on the `All` row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn set_policy(
        &mut self,
        cube_id: CubeId,
        request_type: RequestType,
        grain: Grain,
        limit: PolicyLimit,
        days: u32,
    ) -> Result<()> {
        if !self.cubes.contains_key(&cube_id) {
            return Err(Error::not_found("cube", cube_id));
        }
        self.policy_row(cube_id, request_type, grain).set(limit, days);
        if grain == Grain::DailyGrain {
            self.policy_row(cube_id, request_type, Grain::All)
                .set(limit, days);
        }
        Ok(())
    }

    /// Deletes all of a cube's policy rows; returns how many were removed.
    pub fn clear_lookbacks(&mut self, cube_id: CubeId) -> usize {
        remove_owned(&mut self.lookbacks, |l| l.cube_id == cube_id)
    }

    /// Replaces a cube's policy rows.
    ///
    /// Existing rows are always deleted. New rows are created only when both
    /// arrays are present: lookback entries first, then window entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown cube.
    pub fn replace_lookbacks(
        &mut self,
        cube_id: CubeId,
        lookback: Option<&[PolicyEntry]>,
        window: Option<&[PolicyEntry]>,
    ) -> Result<()> {
        if !self.cubes.contains_key(&cube_id) {
            return Err(Error::not_found("cube", cube_id));
        }
        self.clear_lookbacks(cube_id);
        let (Some(lookback), Some(window)) = (lookback, window) else {
            return Ok(());
        };
        for entry in lookback {
            self.set_policy(
                cube_id,
                entry.request_type,
                entry.grain,
                PolicyLimit::LookbackDays,
                entry.days,
            )?;
        }
        for entry in window {
            self.set_policy(
                cube_id,
                entry.request_type,
                entry.grain,
                PolicyLimit::MaxWindow,
                entry.days,
            )?;
        }
        Ok(())
    }

    fn policy_row(
        &mut self,
        cube_id: CubeId,
        request_type: RequestType,
        grain: Grain,
    ) -> &mut Lookback {
        let existing = self.lookback(cube_id, request_type, grain).map(|row| row.id);
        let id = existing.unwrap_or_else(|| self.sequences.next_lookback());
        self.lookbacks.entry(id).or_insert_with(|| Lookback {
            id,
            cube_id,
            request_type,
            grain,
            lookback_days: None,
            max_window: None,
        })
    }
}

fn remove_owned<K: Ord, V>(table: &mut BTreeMap<K, V>, owned: impl Fn(&V) -> bool) -> usize {
    let before = table.len();
    table.retain(|_, row| !owned(row));
    before - table.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnKind;
    use crate::dependents::NoDependentReports;
    use crate::metric::{AggregationExpression, MetricType};

    fn registry_spec(name: &str) -> RegistrySpec {
        RegistrySpec {
            name: name.to_string(),
            host: "localhost".to_string(),
            port: 8080,
            base_path: "api".to_string(),
            domain_endpoint: "domain".to_string(),
            sync_request_endpoint: "sync".to_string(),
            exposed_schema: "reporting".to_string(),
            allow_list: None,
            deny_list: None,
            cache_timeout: None,
        }
    }

    fn fact(name: &str) -> ColumnUpdate {
        ColumnUpdate {
            name: name.to_string(),
            kind: ColumnKind::Fact,
            data_type: "Integer".to_string(),
            filterable: true,
            declared: AggregationFlags::default(),
        }
    }

    fn identity(name: &str) -> NewMetric {
        NewMetric {
            name: name.to_string(),
            verbose_name: None,
            metric_type: MetricType::Identity,
            expression: AggregationExpression::Identity {
                name: name.to_string(),
                field_name: name.to_string(),
            },
        }
    }

    #[test]
    fn duplicate_registry_names_are_rejected() {
        let mut t = CatalogTables::new();
        t.insert_registry(registry_spec("prod")).unwrap();
        assert!(matches!(
            t.insert_registry(registry_spec("prod")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn ensure_cube_is_idempotent_and_sets_perm() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let a = t.ensure_cube(reg, "keyword_stats").unwrap();
        let b = t.ensure_cube(reg, "keyword_stats").unwrap();
        assert_eq!(a, b);
        let cube = t.cube(a).unwrap();
        assert_eq!(cube.perm, format!("[prod].[keyword_stats](id:{a})"));
        assert_eq!(cube.cube_version, 0);
        assert_eq!(t.cube_full_name(a).unwrap(), "[prod].[keyword_stats]");
    }

    #[test]
    fn same_cube_name_in_two_registries_is_two_cubes() {
        let mut t = CatalogTables::new();
        let prod = t.insert_registry(registry_spec("prod")).unwrap();
        let qa = t.insert_registry(registry_spec("qa")).unwrap();
        let a = t.ensure_cube(prod, "stats").unwrap();
        let b = t.ensure_cube(qa, "stats").unwrap();
        assert_ne!(a, b);
        t.insert_metric_if_absent(a, identity("Clicks")).unwrap();
        assert!(t.insert_metric_if_absent(b, identity("Clicks")).unwrap().is_some());
    }

    #[test]
    fn renaming_registry_recomputes_cube_perms() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        t.update_registry(reg, registry_spec("production")).unwrap();
        assert_eq!(t.cube(cube).unwrap().perm, format!("[production].[stats](id:{cube})"));
    }

    #[test]
    fn upsert_column_never_duplicates_and_keeps_flags() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();

        let mut clicks = fact("Clicks");
        clicks.declared.sum = true;
        let first = t.upsert_column(cube, clicks).unwrap();
        let second = t.upsert_column(cube, fact("Clicks")).unwrap();
        assert_eq!(first, second);
        assert_eq!(t.columns_for_cube(cube).count(), 1);
        assert!(t.column(first).unwrap().flags.sum);
    }

    #[test]
    fn dimension_columns_always_group() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        let id = t
            .upsert_column(
                cube,
                ColumnUpdate {
                    kind: ColumnKind::Dimension,
                    ..fact("Day")
                },
            )
            .unwrap();
        assert!(t.column(id).unwrap().flags.groupby);

        t.update_column_flags(id, AggregationFlags::default()).unwrap();
        assert!(t.column(id).unwrap().flags.groupby);
    }

    #[test]
    fn daily_policy_mirrors_onto_all() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        t.set_policy(
            cube,
            RequestType::SyncRequest,
            Grain::DailyGrain,
            PolicyLimit::LookbackDays,
            400,
        )
        .unwrap();
        t.set_policy(
            cube,
            RequestType::SyncRequest,
            Grain::DailyGrain,
            PolicyLimit::MaxWindow,
            366,
        )
        .unwrap();

        let all = t.lookback(cube, RequestType::SyncRequest, Grain::All).unwrap();
        assert_eq!(all.lookback_days, Some(400));
        assert_eq!(all.max_window, Some(366));
        assert!(t.lookback(cube, RequestType::AsyncRequest, Grain::All).is_none());
    }

    #[test]
    fn replace_lookbacks_without_both_arrays_only_clears() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        let entry = PolicyEntry {
            request_type: RequestType::SyncRequest,
            grain: Grain::HourlyGrain,
            days: 3,
        };
        t.replace_lookbacks(cube, Some(&[entry]), Some(&[entry])).unwrap();
        assert_eq!(t.lookbacks_for_cube(cube).count(), 1);

        t.replace_lookbacks(cube, Some(&[entry]), None).unwrap();
        assert_eq!(t.lookbacks_for_cube(cube).count(), 0);
    }

    #[test]
    fn remove_cube_cascades() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        t.upsert_column(cube, fact("Clicks")).unwrap();
        t.insert_metric_if_absent(cube, identity("Clicks")).unwrap();
        t.set_policy(
            cube,
            RequestType::SyncRequest,
            Grain::HourlyGrain,
            PolicyLimit::LookbackDays,
            3,
        )
        .unwrap();

        let removal = t.delete_cube(cube, &NoDependentReports).unwrap();
        assert_eq!(removal.columns, 1);
        assert_eq!(removal.metrics, 1);
        assert_eq!(removal.lookbacks, 1);
        assert!(t.cube(cube).is_none());
        assert_eq!(t.columns_for_cube(cube).count(), 0);
    }

    #[test]
    fn referenced_cube_blocks_deletion() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        let reports = BTreeMap::from([(cube, 2_usize)]);

        let err = t.delete_cube(cube, &reports).unwrap_err();
        assert!(err.to_string().contains("2 report(s) reference [prod].[stats]"));

        let err = t.delete_registry(reg, &reports).unwrap_err();
        assert!(matches!(err, Error::DeletionBlocked { .. }));
        assert!(t.registry(reg).is_some());
        assert!(t.cube(cube).is_some());
    }

    #[test]
    fn retain_prunes_by_name() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        t.upsert_column(cube, fact("Clicks")).unwrap();
        t.upsert_column(cube, fact("Spend")).unwrap();
        t.insert_metric_if_absent(cube, identity("Clicks")).unwrap();
        t.insert_metric_if_absent(cube, identity("Spend")).unwrap();

        let keep = vec!["Clicks".to_string()];
        assert_eq!(t.retain_columns(cube, &keep), vec!["Spend".to_string()]);
        assert_eq!(t.retain_metrics(cube, &keep), vec!["Spend".to_string()]);
        assert!(t.find_metric(cube, "Clicks").is_some());
    }

    #[test]
    fn bump_cube_version_increments() {
        let mut t = CatalogTables::new();
        let reg = t.insert_registry(registry_spec("prod")).unwrap();
        let cube = t.ensure_cube(reg, "stats").unwrap();
        assert_eq!(t.bump_cube_version(cube).unwrap(), 1);
        assert_eq!(t.bump_cube_version(cube).unwrap(), 2);
    }
}
