//! Metric generation from column capability flags.
//!
//! Metrics are never authored directly. Each one is derived from exactly one
//! column, and regeneration is a non-destructive upsert: a candidate is only
//! inserted when its cube has no metric of that name yet. Stale metrics are
//! removed by the sync pass, which prunes by the remote field list.

use strata_catalog::{
    AggregationExpression, CatalogTables, Column, ColumnId, CubeId, MetricType, NewMetric,
};
use strata_core::{Error, Result};

/// Metric candidates implied by a column's current flags, in insertion order.
///
/// All candidates share the column's name, so the first one inserted for a
/// cube is the one that sticks.
#[must_use]
pub fn candidate_metrics(column: &Column) -> Vec<NewMetric> {
    let name = column.name.clone();
    let mut candidates = Vec::new();

    if column.is_fact() {
        candidates.push(NewMetric {
            name: name.clone(),
            verbose_name: Some(name.clone()),
            metric_type: MetricType::Identity,
            expression: AggregationExpression::Identity {
                name: name.clone(),
                field_name: name.clone(),
            },
        });
    }

    let kind = column.kind.to_string().to_lowercase();
    let typed = [
        (column.flags.sum, MetricType::Sum, "Sum", "SUM"),
        (column.flags.min, MetricType::Min, "Min", "MIN"),
        (column.flags.max, MetricType::Max, "Max", "MAX"),
    ];
    for (enabled, metric_type, suffix, label) in typed {
        if enabled {
            candidates.push(NewMetric {
                name: name.clone(),
                verbose_name: Some(format!("{label}({name})")),
                metric_type,
                expression: AggregationExpression::Typed {
                    kind: format!("{kind}{suffix}"),
                    name: name.clone(),
                    field_name: name.clone(),
                },
            });
        }
    }

    if column.flags.count_distinct {
        candidates.push(NewMetric {
            name: name.clone(),
            verbose_name: Some(format!("COUNT(DISTINCT {name})")),
            metric_type: MetricType::CountDistinct,
            expression: AggregationExpression::Cardinality {
                kind: "cardinality".to_string(),
                name: name.clone(),
                field_names: vec![name],
            },
        });
    }

    candidates
}

/// Inserts the missing metrics for one column; returns how many were created.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown column.
pub fn generate_column_metrics(tables: &mut CatalogTables, column_id: ColumnId) -> Result<usize> {
    let column = tables
        .column(column_id)
        .cloned()
        .ok_or_else(|| Error::not_found("column", column_id))?;
    let mut created = 0;
    for candidate in candidate_metrics(&column) {
        if tables
            .insert_metric_if_absent(column.cube_id, candidate)?
            .is_some()
        {
            created += 1;
        }
    }
    Ok(created)
}

/// Runs metric generation for every column of a cube; returns how many
/// metrics were created.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown cube.
pub fn regenerate_metrics(tables: &mut CatalogTables, cube_id: CubeId) -> Result<usize> {
    if tables.cube(cube_id).is_none() {
        return Err(Error::not_found("cube", cube_id));
    }
    let column_ids: Vec<ColumnId> = tables.columns_for_cube(cube_id).map(|c| c.id).collect();
    let mut created = 0;
    for column_id in column_ids {
        created += generate_column_metrics(tables, column_id)?;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_catalog::{AggregationFlags, ColumnKind, ColumnUpdate, RegistrySpec};

    fn tables_with_cube() -> (CatalogTables, CubeId) {
        let mut tables = CatalogTables::new();
        let registry = tables
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
        let cube = tables.ensure_cube(registry, "stats").unwrap();
        (tables, cube)
    }

    fn update(name: &str, kind: ColumnKind, declared: AggregationFlags) -> ColumnUpdate {
        ColumnUpdate {
            name: name.into(),
            kind,
            data_type: "Integer".into(),
            filterable: true,
            declared,
        }
    }

    #[test]
    fn fact_with_sum_yields_identity_then_sum() {
        let (mut tables, cube) = tables_with_cube();
        let id = tables
            .upsert_column(
                cube,
                update(
                    "Clicks",
                    ColumnKind::Fact,
                    AggregationFlags {
                        sum: true,
                        ..AggregationFlags::default()
                    },
                ),
            )
            .unwrap();
        let column = tables.column(id).unwrap().clone();

        let candidates = candidate_metrics(&column);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].metric_type, MetricType::Identity);
        assert_eq!(candidates[1].metric_type, MetricType::Sum);
        assert_eq!(candidates[1].verbose_name.as_deref(), Some("SUM(Clicks)"));
        assert_eq!(
            candidates[1].expression,
            AggregationExpression::Typed {
                kind: "factSum".into(),
                name: "Clicks".into(),
                field_name: "Clicks".into(),
            }
        );
    }

    #[test]
    fn plain_dimension_yields_nothing() {
        let (mut tables, cube) = tables_with_cube();
        let id = tables
            .upsert_column(cube, update("Day", ColumnKind::Dimension, AggregationFlags::default()))
            .unwrap();
        assert!(candidate_metrics(tables.column(id).unwrap()).is_empty());
    }

    #[test]
    fn count_distinct_lists_column_as_sole_field() {
        let (mut tables, cube) = tables_with_cube();
        let id = tables
            .upsert_column(
                cube,
                update(
                    "Keyword ID",
                    ColumnKind::Dimension,
                    AggregationFlags {
                        count_distinct: true,
                        ..AggregationFlags::default()
                    },
                ),
            )
            .unwrap();
        let candidates = candidate_metrics(tables.column(id).unwrap());
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].verbose_name.as_deref(),
            Some("COUNT(DISTINCT Keyword ID)")
        );
        assert_eq!(
            candidates[0].expression.to_json(),
            r#"{"type":"cardinality","name":"Keyword ID","fieldNames":["Keyword ID"]}"#
        );
    }

    #[test]
    fn generation_keeps_the_first_metric_per_name() {
        let (mut tables, cube) = tables_with_cube();
        let id = tables
            .upsert_column(
                cube,
                update(
                    "Spend",
                    ColumnKind::Fact,
                    AggregationFlags {
                        sum: true,
                        max: true,
                        ..AggregationFlags::default()
                    },
                ),
            )
            .unwrap();

        assert_eq!(generate_column_metrics(&mut tables, id).unwrap(), 1);
        assert_eq!(generate_column_metrics(&mut tables, id).unwrap(), 0);

        let metrics: Vec<_> = tables.metrics_for_cube(cube).collect();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].metric_type, MetricType::Identity);
    }

    #[test]
    fn regenerate_covers_every_column() {
        let (mut tables, cube) = tables_with_cube();
        tables
            .upsert_column(cube, update("Clicks", ColumnKind::Fact, AggregationFlags::default()))
            .unwrap();
        tables
            .upsert_column(cube, update("Spend", ColumnKind::Fact, AggregationFlags::default()))
            .unwrap();
        tables
            .upsert_column(cube, update("Day", ColumnKind::Dimension, AggregationFlags::default()))
            .unwrap();

        assert_eq!(regenerate_metrics(&mut tables, cube).unwrap(), 2);
        assert_eq!(regenerate_metrics(&mut tables, cube).unwrap(), 0);
    }

    #[test]
    fn regenerate_rejects_unknown_cube() {
        let (mut tables, _) = tables_with_cube();
        let err = regenerate_metrics(&mut tables, CubeId::new(999)).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
