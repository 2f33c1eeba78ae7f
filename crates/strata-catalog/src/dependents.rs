//! Lookup of report definitions that depend on cubes.
//!
//! Reports live in the host application, outside the catalog. Administrative
//! deletes consult this seam so a cube that reports still reference is never
//! removed out from under them.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::id::CubeId;

/// Counts report definitions referencing a cube.
pub trait DependentReports {
    /// Number of reports that reference `cube`.
    fn reports_referencing(&self, cube: CubeId) -> usize;
}

/// No reports exist; every delete is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependentReports;

impl DependentReports for NoDependentReports {
    fn reports_referencing(&self, _cube: CubeId) -> usize {
        0
    }
}

impl DependentReports for BTreeMap<CubeId, usize> {
    fn reports_referencing(&self, cube: CubeId) -> usize {
        self.get(&cube).copied().unwrap_or(0)
    }
}

impl<S: BuildHasher> DependentReports for HashMap<CubeId, usize, S> {
    fn reports_referencing(&self, cube: CubeId) -> usize {
        self.get(&cube).copied().unwrap_or(0)
    }
}
