//! Scriptable in-memory [`RemoteSchema`].
//!
//! Tests declare what each registry serves (cube lists, cube documents, query
//! responses) and which calls should fail. Every call is recorded for later
//! assertion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use strata_catalog::Registry;
use strata_core::{Error, RequestContext, Result};
use strata_remote::{CubeDocument, QueryDocument, QueryResponse, RemoteSchema};

/// Record of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    /// `ping`.
    Ping {
        /// Registry name.
        registry: String,
        /// Request id sent.
        request_id: String,
    },
    /// `list_cubes`.
    ListCubes {
        /// Registry name.
        registry: String,
        /// Request id sent.
        request_id: String,
    },
    /// `fetch_cube`.
    FetchCube {
        /// Registry name.
        registry: String,
        /// Cube name.
        cube: String,
        /// Revision requested.
        cube_version: u32,
        /// Request id sent.
        request_id: String,
    },
    /// `execute`.
    Execute {
        /// Registry name.
        registry: String,
        /// Revision sent as `forceRevision`.
        cube_version: u32,
        /// Posted document.
        query: QueryDocument,
        /// Request id sent.
        request_id: String,
    },
}

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Behaves like a timeout or non-2xx answer.
    Unavailable,
    /// Behaves like an empty or malformed body.
    InvalidData,
}

impl Failure {
    fn into_error(self, registry: &str, ctx: &RequestContext, what: &str) -> Error {
        match self {
            Self::Unavailable => {
                Error::remote_unavailable(registry, ctx.request_id(), format!("{what}: injected outage"))
            }
            Self::InvalidData => {
                Error::remote_data_invalid(registry, ctx.request_id(), format!("{what}: empty response body"))
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    cube_lists: HashMap<String, Vec<String>>,
    documents: HashMap<(String, String), CubeDocument>,
    responses: HashMap<String, QueryResponse>,
    registry_failures: HashMap<String, Failure>,
    cube_failures: HashMap<(String, String), Failure>,
    execute_failures: HashMap<String, Failure>,
    operations: Vec<RemoteOp>,
}

/// In-memory remote service keyed by registry name.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<State>>,
}

impl MockRemote {
    /// Creates a remote that serves nothing.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock remote lock")
    }

    /// Sets the cube list a registry serves.
    pub fn set_cubes(&self, registry: &str, cubes: &[&str]) {
        self.state().cube_lists.insert(
            registry.to_string(),
            cubes.iter().map(ToString::to_string).collect(),
        );
    }

    /// Serves a cube document and adds the cube to the registry's list if missing.
    pub fn serve_cube(&self, registry: &str, cube: &str, document: CubeDocument) {
        let mut state = self.state();
        let list = state.cube_lists.entry(registry.to_string()).or_default();
        if !list.iter().any(|c| c == cube) {
            list.push(cube.to_string());
        }
        state
            .documents
            .insert((registry.to_string(), cube.to_string()), document);
    }

    /// Removes a cube from the registry's list and stops serving its document.
    pub fn withdraw_cube(&self, registry: &str, cube: &str) {
        let mut state = self.state();
        if let Some(list) = state.cube_lists.get_mut(registry) {
            list.retain(|c| c != cube);
        }
        state
            .documents
            .remove(&(registry.to_string(), cube.to_string()));
    }

    /// Sets the response returned by `execute` for a registry.
    pub fn set_response(&self, registry: &str, response: QueryResponse) {
        self.state()
            .responses
            .insert(registry.to_string(), response);
    }

    /// Makes `ping` and `list_cubes` fail for a registry.
    pub fn fail_registry(&self, registry: &str, failure: Failure) {
        self.state()
            .registry_failures
            .insert(registry.to_string(), failure);
    }

    /// Makes `fetch_cube` fail for one cube.
    pub fn fail_cube(&self, registry: &str, cube: &str, failure: Failure) {
        self.state()
            .cube_failures
            .insert((registry.to_string(), cube.to_string()), failure);
    }

    /// Makes `execute` fail for a registry.
    pub fn fail_execute(&self, registry: &str, failure: Failure) {
        self.state()
            .execute_failures
            .insert(registry.to_string(), failure);
    }

    /// Clears all injected failures.
    pub fn heal(&self) {
        let mut state = self.state();
        state.registry_failures.clear();
        state.cube_failures.clear();
        state.execute_failures.clear();
    }

    /// All recorded calls, in order.
    pub fn operations(&self) -> Vec<RemoteOp> {
        self.state().operations.clone()
    }

    /// Documents posted through `execute`, in order.
    pub fn executed_queries(&self) -> Vec<QueryDocument> {
        self.state()
            .operations
            .iter()
            .filter_map(|op| match op {
                RemoteOp::Execute { query, .. } => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `fetch_cube` calls for a cube.
    pub fn fetch_count(&self, cube: &str) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| matches!(op, RemoteOp::FetchCube { cube: c, .. } if c == cube))
            .count()
    }
}

#[async_trait]
impl RemoteSchema for MockRemote {
    async fn ping(&self, ctx: &RequestContext, registry: &Registry) -> Result<()> {
        let mut state = self.state();
        state.operations.push(RemoteOp::Ping {
            registry: registry.name.clone(),
            request_id: ctx.request_id().to_string(),
        });
        match state.registry_failures.get(&registry.name) {
            Some(failure) => Err(failure.into_error(&registry.name, ctx, "ping")),
            None => Ok(()),
        }
    }

    async fn list_cubes(&self, ctx: &RequestContext, registry: &Registry) -> Result<Vec<String>> {
        let mut state = self.state();
        state.operations.push(RemoteOp::ListCubes {
            registry: registry.name.clone(),
            request_id: ctx.request_id().to_string(),
        });
        if let Some(failure) = state.registry_failures.get(&registry.name) {
            return Err(failure.into_error(&registry.name, ctx, "list cubes"));
        }
        Ok(state
            .cube_lists
            .get(&registry.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_cube(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_name: &str,
        cube_version: u32,
    ) -> Result<CubeDocument> {
        let mut state = self.state();
        state.operations.push(RemoteOp::FetchCube {
            registry: registry.name.clone(),
            cube: cube_name.to_string(),
            cube_version,
            request_id: ctx.request_id().to_string(),
        });
        let key = (registry.name.clone(), cube_name.to_string());
        if let Some(failure) = state.cube_failures.get(&key) {
            return Err(failure.into_error(&registry.name, ctx, cube_name));
        }
        state.documents.get(&key).cloned().ok_or_else(|| Error::RemoteUnavailable {
            registry: registry.name.clone(),
            request_id: ctx.request_id().to_string(),
            status: Some(404),
            message: format!("HTTP 404 Not Found: cube '{cube_name}'"),
        })
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_version: u32,
        query: &QueryDocument,
    ) -> Result<QueryResponse> {
        let mut state = self.state();
        state.operations.push(RemoteOp::Execute {
            registry: registry.name.clone(),
            cube_version,
            query: query.clone(),
            request_id: ctx.request_id().to_string(),
        });
        if let Some(failure) = state.execute_failures.get(&registry.name) {
            return Err(failure.into_error(&registry.name, ctx, "execute"));
        }
        state
            .responses
            .get(&registry.name)
            .cloned()
            .ok_or_else(|| {
                Error::remote_data_invalid(&registry.name, ctx.request_id(), "empty response body")
            })
    }
}
