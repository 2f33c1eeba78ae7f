//! Custom assertion helpers for integration tests.

use strata_catalog::{Catalog, RegistryId};

use crate::remote::RemoteOp;

/// Asserts that every cube, column, metric and policy row has a live owner.
///
/// # Panics
///
/// Panics on the first orphaned row.
pub fn assert_no_orphans(catalog: &Catalog) {
    catalog
        .read(|t| {
            for cube in t.cubes() {
                assert!(
                    t.registry(cube.registry_id).is_some(),
                    "cube {} points at missing registry {}",
                    cube.name,
                    cube.registry_id
                );
            }
            for column in t.columns() {
                assert!(
                    t.cube(column.cube_id).is_some(),
                    "column {} points at missing cube {}",
                    column.name,
                    column.cube_id
                );
            }
            for metric in t.metrics() {
                assert!(
                    t.cube(metric.cube_id).is_some(),
                    "metric {} points at missing cube {}",
                    metric.name,
                    metric.cube_id
                );
            }
            for lookback in t.lookbacks() {
                assert!(
                    t.cube(lookback.cube_id).is_some(),
                    "policy row {} points at missing cube {}",
                    lookback.id,
                    lookback.cube_id
                );
            }
        })
        .expect("catalog read");
}

/// Asserts that no cube with `name` exists under the registry.
///
/// # Panics
///
/// Panics if the cube is present.
pub fn assert_cube_absent(catalog: &Catalog, registry: RegistryId, name: &str) {
    let present = catalog
        .read(|t| t.find_cube(registry, name).is_some())
        .expect("catalog read");
    assert!(!present, "cube {name} should have been removed");
}

/// Asserts which cubes were fetched from the remote, ignoring order.
///
/// # Panics
///
/// Panics if the fetched cubes differ.
pub fn assert_fetched(operations: &[RemoteOp], expected: &[&str]) {
    let mut fetched: Vec<&str> = operations
        .iter()
        .filter_map(|op| match op {
            RemoteOp::FetchCube { cube, .. } => Some(cube.as_str()),
            _ => None,
        })
        .collect();
    fetched.sort_unstable();
    let mut expected = expected.to_vec();
    expected.sort_unstable();
    assert_eq!(fetched, expected, "fetched cubes differ");
}
