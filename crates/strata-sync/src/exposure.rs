//! Applying a registry's allow/deny rule to the remote cube list.

use serde::Serialize;

use strata_catalog::CubeExposure;

/// Cubes a registry exposes after filtering, with any warnings raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExposedCubes {
    /// Exposed cube names, in remote order (allow-list order for allow-lists).
    pub cubes: Vec<String>,
    /// Non-fatal problems, e.g. allow-listed names the remote does not serve.
    pub warnings: Vec<String>,
}

impl ExposedCubes {
    /// Whether `name` is exposed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cubes.iter().any(|c| c == name)
    }
}

/// Filters the remote cube list through an exposure rule.
///
/// An allow-list keeps the named cubes the remote serves and warns about the
/// rest. A deny-list keeps every remote cube it does not name.
#[must_use]
pub fn resolve_exposure(exposure: &CubeExposure, remote: &[String], schema: &str) -> ExposedCubes {
    match exposure {
        CubeExposure::All => ExposedCubes {
            cubes: dedup(remote.iter().cloned()),
            warnings: Vec::new(),
        },
        CubeExposure::AllowList(allowed) => {
            let mut warnings = Vec::new();
            let cubes = dedup(allowed.iter().filter_map(|name| {
                if remote.contains(name) {
                    Some(name.clone())
                } else {
                    warnings.push(format!("Cube {name} does not exist in {schema} schema"));
                    None
                }
            }));
            ExposedCubes { cubes, warnings }
        }
        CubeExposure::DenyList(denied) => ExposedCubes {
            cubes: dedup(remote.iter().filter(|c| !denied.contains(c)).cloned()),
            warnings: Vec::new(),
        },
    }
}

fn dedup(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
