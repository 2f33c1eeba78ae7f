//! Catalog, remote and settings shared by every command.

use std::sync::Arc;

use anyhow::{Context, Result};

use strata_catalog::{Catalog, CubeId, RegistryId};
use strata_core::{Config, RequestContext};
use strata_query::QueryService;
use strata_remote::{HttpRemoteClient, RemoteSchema};
use strata_sync::SyncEngine;

use crate::OutputFormat;

/// One CLI invocation's view of the world.
pub struct Session {
    config: Config,
    format: OutputFormat,
    catalog: Arc<Catalog>,
    remote: Arc<dyn RemoteSchema>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("catalog_path", &self.config.catalog_path)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Loads the catalog snapshot named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    pub fn open(config: Config, format: OutputFormat) -> Result<Self> {
        let catalog = Catalog::open(&config.catalog_path).with_context(|| {
            format!("Failed to open catalog {}", config.catalog_path.display())
        })?;
        let remote = Arc::new(HttpRemoteClient::from_config(&config));
        Ok(Self::new(config, format, Arc::new(catalog), remote))
    }

    /// Assembles a session from parts.
    #[must_use]
    pub fn new(
        config: Config,
        format: OutputFormat,
        catalog: Arc<Catalog>,
        remote: Arc<dyn RemoteSchema>,
    ) -> Self {
        Self {
            config,
            format,
            catalog,
            remote,
        }
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// The loaded catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Writes the catalog back to its snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn persist(&self) -> Result<()> {
        self.catalog
            .persist(&self.config.catalog_path)
            .with_context(|| {
                format!("Failed to write catalog {}", self.config.catalog_path.display())
            })?;
        tracing::debug!(path = %self.config.catalog_path.display(), "catalog snapshot written");
        Ok(())
    }

    /// A fresh request context for the configured caller.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.config.caller_identity.clone())
    }

    /// Sync engine over this session's catalog and remote.
    #[must_use]
    pub fn sync_engine(&self) -> SyncEngine {
        SyncEngine::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.remote),
            self.config.clone(),
        )
    }

    /// Query service over this session's catalog and remote.
    #[must_use]
    pub fn query_service(&self) -> QueryService {
        QueryService::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.remote),
            self.config.clone(),
        )
    }

    /// Resolves a registry name.
    ///
    /// # Errors
    ///
    /// Returns an error if no registry has that name.
    pub fn registry_id(&self, name: &str) -> Result<RegistryId> {
        self.catalog
            .read(|t| t.registry_by_name(name).map(|r| r.id))?
            .with_context(|| format!("Registry '{name}' not found"))
    }

    /// Resolves a cube by registry and cube name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or cube is unknown.
    pub fn cube_id(&self, registry: &str, cube: &str) -> Result<CubeId> {
        let registry_id = self.registry_id(registry)?;
        self.catalog
            .read(|t| t.find_cube(registry_id, cube).map(|c| c.id))?
            .with_context(|| {
                format!("Cube '{cube}' not found in registry '{registry}'. Run `strata refresh` first")
            })
    }
}
