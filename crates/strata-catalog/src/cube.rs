//! Cube rows.

use serde::{Deserialize, Serialize};

use crate::id::{CubeId, RegistryId};

/// One analytical dataset exposed by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cube {
    /// Surrogate id.
    pub id: CubeId,
    /// Cube name, unique within its registry.
    pub name: String,
    /// Owning registry.
    pub registry_id: RegistryId,
    /// Revision counter sent as `forceRevision` to bypass remote caching.
    pub cube_version: u32,
    /// Entity-id keys reported by the remote schema, in document order.
    pub schema: Vec<String>,
    /// Permission string, `[<registry>].[<cube>](id:<id>)`.
    pub perm: String,
    /// Free-form description.
    pub description: Option<String>,
}

impl Cube {
    pub(crate) fn perm_for(registry_name: &str, cube_name: &str, id: CubeId) -> String {
        format!("[{registry_name}].[{cube_name}](id:{id})")
    }

    /// Fully qualified name, `[<registry>].[<cube>]`.
    #[must_use]
    pub fn full_name(&self, registry_name: &str) -> String {
        format!("[{registry_name}].[{}]", self.name)
    }
}
