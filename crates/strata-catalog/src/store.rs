//! Shared, transactional handle over the catalog tables.
//!
//! Readers see a consistent snapshot. Writers run a closure against a private
//! copy of the tables; the copy replaces the live tables only when the closure
//! returns `Ok`, so a failed sync of one cube leaves no partial changes behind.
//!
//! The catalog can be saved to and loaded from a JSON snapshot file. Saves
//! write a sibling temporary file first and rename it into place.

use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use strata_core::{Error, Result};

use crate::column::Column;
use crate::cube::Cube;
use crate::id::IdSequences;
use crate::lookback::Lookback;
use crate::metric::Metric;
use crate::registry::Registry;
use crate::tables::CatalogTables;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("catalog lock poisoned")
}

/// The catalog store.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<CatalogTables>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps existing tables.
    #[must_use]
    pub fn from_tables(tables: CatalogTables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Runs a read-only closure over a consistent view of the tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn read<R>(&self, f: impl FnOnce(&CatalogTables) -> R) -> Result<R> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(f(&tables))
    }

    /// Runs a mutating closure as one transaction.
    ///
    /// Transactions are serialized. Changes become visible only if the closure
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or an error if the lock is poisoned.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut CatalogTables) -> Result<R>) -> Result<R> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let mut working = tables.clone();
        let out = f(&mut working)?;
        *tables = working;
        Ok(out)
    }

    /// Returns a copy of the current tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self) -> Result<CatalogTables> {
        self.read(Clone::clone)
    }

    /// Loads a catalog from a snapshot file, or returns an empty catalog if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read or is not a valid
    /// snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no catalog snapshot, starting empty");
            return Ok(Self::new());
        }
        let bytes = fs::read(path).map_err(|e| {
            Error::storage_with_source(format!("failed to read {}", path.display()), e)
        })?;
        let snapshot: CatalogSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
            Error::storage_with_source(format!("failed to parse {}", path.display()), e)
        })?;
        let tables = snapshot.into_tables()?;
        tracing::info!(
            path = %path.display(),
            registries = tables.registries.len(),
            cubes = tables.cubes.len(),
            "loaded catalog snapshot"
        );
        Ok(Self::from_tables(tables))
    }

    /// Writes the catalog to a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.read(CatalogSnapshot::from_tables)?;
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::storage_with_source("failed to serialize catalog", e))?;

        let mut tmp_name = path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = Path::new(&tmp_name);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::storage_with_source(format!("failed to create {}", parent.display()), e)
            })?;
        }
        fs::write(tmp, &bytes).map_err(|e| {
            Error::storage_with_source(format!("failed to write {}", tmp.display()), e)
        })?;
        fs::rename(tmp, path).map_err(|e| {
            Error::storage_with_source(format!("failed to replace {}", path.display()), e)
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "persisted catalog");
        Ok(())
    }
}

/// On-disk form of the catalog: flat row lists plus id sequences.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogSnapshot {
    format_version: u32,
    sequences: IdSequences,
    registries: Vec<Registry>,
    cubes: Vec<Cube>,
    columns: Vec<Column>,
    metrics: Vec<Metric>,
    lookbacks: Vec<Lookback>,
}

impl CatalogSnapshot {
    fn from_tables(tables: &CatalogTables) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            sequences: tables.sequences.clone(),
            registries: tables.registries.values().cloned().collect(),
            cubes: tables.cubes.values().cloned().collect(),
            columns: tables.columns.values().cloned().collect(),
            metrics: tables.metrics.values().cloned().collect(),
            lookbacks: tables.lookbacks.values().cloned().collect(),
        }
    }

    fn into_tables(self) -> Result<CatalogTables> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::storage(format!(
                "unsupported catalog snapshot version {}",
                self.format_version
            )));
        }

        let mut tables = CatalogTables {
            sequences: self.sequences,
            ..CatalogTables::default()
        };
        tables.registries = self.registries.into_iter().map(|r| (r.id, r)).collect();
        for cube in self.cubes {
            if !tables.registries.contains_key(&cube.registry_id) {
                return Err(dangling("cube", &cube.name, "registry"));
            }
            tables.cubes.insert(cube.id, cube);
        }
        for column in self.columns {
            if !tables.cubes.contains_key(&column.cube_id) {
                return Err(dangling("column", &column.name, "cube"));
            }
            tables.columns.insert(column.id, column);
        }
        for metric in self.metrics {
            if !tables.cubes.contains_key(&metric.cube_id) {
                return Err(dangling("metric", &metric.name, "cube"));
            }
            tables.metrics.insert(metric.id, metric);
        }
        for lookback in self.lookbacks {
            if !tables.cubes.contains_key(&lookback.cube_id) {
                return Err(dangling("lookback", &lookback.id.to_string(), "cube"));
            }
            tables.lookbacks.insert(lookback.id, lookback);
        }
        Ok(tables)
    }
}

fn dangling(kind: &str, name: &str, owner: &str) -> Error {
    Error::storage(format!("snapshot {kind} '{name}' references a missing {owner}"))
}
