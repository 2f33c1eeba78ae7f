//! Registry rows: remote dataset sources and their cube exposure rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strata_core::config::split_list;
use strata_core::{Error, Result};

use crate::id::RegistryId;

/// Schema name read from the remote cube list when a registry does not override it.
pub const DEFAULT_EXPOSED_SCHEMA: &str = "reporting";

/// Which remote cubes a registry exposes locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "cubes", rename_all = "snake_case")]
pub enum CubeExposure {
    /// Every remote cube is exposed.
    #[default]
    All,
    /// Only the named cubes are exposed.
    AllowList(Vec<String>),
    /// Every remote cube except the named ones is exposed.
    DenyList(Vec<String>),
}

impl CubeExposure {
    /// Builds the exposure rule from the raw comma-separated admin fields.
    ///
    /// Blank lists count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigConflict`] when both lists are non-empty.
    pub fn from_lists(allow: Option<&str>, deny: Option<&str>) -> Result<Self> {
        let allow = allow.map(split_list).unwrap_or_default();
        let deny = deny.map(split_list).unwrap_or_default();
        match (allow.is_empty(), deny.is_empty()) {
            (false, false) => Err(Error::ConfigConflict {
                message: "a registry cannot have both an allow-list and a deny-list".to_string(),
            }),
            (false, true) => Ok(Self::AllowList(allow)),
            (true, false) => Ok(Self::DenyList(deny)),
            (true, true) => Ok(Self::All),
        }
    }
}

/// Admin-supplied registry definition, validated on insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    /// Unique registry name.
    pub name: String,
    /// Remote host name.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// API base path below the host, e.g. `reporting/api/v2`.
    pub base_path: String,
    /// Path of the cube-list document below the base path.
    pub domain_endpoint: String,
    /// Path of the synchronous query endpoint below the base path.
    pub sync_request_endpoint: String,
    /// Key of the cube list inside the remote `schemas` object.
    #[serde(default = "default_exposed_schema")]
    pub exposed_schema: String,
    /// Comma-separated allow-list.
    #[serde(default)]
    pub allow_list: Option<String>,
    /// Comma-separated deny-list.
    #[serde(default)]
    pub deny_list: Option<String>,
    /// Result cache timeout in seconds, passed through to consumers.
    #[serde(default)]
    pub cache_timeout: Option<u32>,
}

fn default_exposed_schema() -> String {
    DEFAULT_EXPOSED_SCHEMA.to_string()
}

/// A remote dataset source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Surrogate id.
    pub id: RegistryId,
    /// Unique registry name.
    pub name: String,
    /// Remote host name.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// API base path below the host.
    pub base_path: String,
    /// Path of the cube-list document below the base path.
    pub domain_endpoint: String,
    /// Path of the synchronous query endpoint below the base path.
    pub sync_request_endpoint: String,
    /// Key of the cube list inside the remote `schemas` object.
    pub exposed_schema: String,
    /// Cube exposure rule.
    pub exposure: CubeExposure,
    /// Result cache timeout in seconds.
    pub cache_timeout: Option<u32>,
    /// Completion time of the last refresh pass.
    pub metadata_last_refreshed: Option<DateTime<Utc>>,
}

impl Registry {
    /// Builds a registry row from a validated definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigConflict`] when both cube lists are set and
    /// [`Error::InvalidInput`] for an empty name or host.
    pub fn new(id: RegistryId, spec: RegistrySpec) -> Result<Self> {
        let mut registry = Self {
            id,
            name: String::new(),
            host: String::new(),
            port: 0,
            base_path: String::new(),
            domain_endpoint: String::new(),
            sync_request_endpoint: String::new(),
            exposed_schema: String::new(),
            exposure: CubeExposure::All,
            cache_timeout: None,
            metadata_last_refreshed: None,
        };
        registry.apply(spec)?;
        Ok(registry)
    }

    pub(crate) fn apply(&mut self, spec: RegistrySpec) -> Result<()> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("registry name cannot be empty".to_string()));
        }
        if spec.host.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "registry '{name}' has an empty host"
            )));
        }
        let exposure = CubeExposure::from_lists(spec.allow_list.as_deref(), spec.deny_list.as_deref())?;

        self.name = name.to_string();
        self.host = spec.host.trim().to_string();
        self.port = spec.port;
        self.base_path = spec.base_path;
        self.domain_endpoint = spec.domain_endpoint;
        self.sync_request_endpoint = spec.sync_request_endpoint;
        self.exposed_schema = if spec.exposed_schema.trim().is_empty() {
            default_exposed_schema()
        } else {
            spec.exposed_schema.trim().to_string()
        };
        self.exposure = exposure;
        self.cache_timeout = spec.cache_timeout;
        Ok(())
    }

    /// Permission string, `[<registry>].(id:<id>)`.
    #[must_use]
    pub fn perm(&self) -> String {
        format!("[{}].(id:{})", self.name, self.id)
    }

    /// URL of the cube-list document. Always ends with a slash.
    #[must_use]
    pub fn domain_url(&self) -> String {
        format!(
            "{}/{}/",
            self.base_url(),
            trim_slashes(&self.domain_endpoint)
        )
    }

    /// URL of one cube's field/window document at a given revision.
    #[must_use]
    pub fn cube_url(&self, cube_name: &str, cube_version: u32) -> String {
        format!("{}cubes/{cube_name}/{cube_version}", self.domain_url())
    }

    /// URL of the synchronous query endpoint.
    #[must_use]
    pub fn sync_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url(),
            trim_slashes(&self.sync_request_endpoint)
        )
    }

    fn base_url(&self) -> String {
        let base = trim_slashes(&self.base_path);
        if base.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}/{base}", self.host, self.port)
        }
    }
}

fn trim_slashes(path: &str) -> &str {
    path.trim().trim_matches('/')
}
