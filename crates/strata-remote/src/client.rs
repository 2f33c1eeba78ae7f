//! HTTP client for the remote registry and query service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use strata_catalog::Registry;
use strata_core::{Config, Error, RequestContext, Result};

use crate::wire::{CubeDocument, DomainDocument, QueryDocument, QueryResponse, RemoteFailure};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the sync engine and query service need from the remote service.
///
/// Every call carries an explicit [`RequestContext`]; its request id and
/// caller identity go out as headers.
#[async_trait]
pub trait RemoteSchema: Send + Sync {
    /// Issues a lightweight GET against the registry's cube-list URL.
    ///
    /// Succeeds on a 2xx response with a non-empty body.
    async fn ping(&self, ctx: &RequestContext, registry: &Registry) -> Result<()>;

    /// Lists the cube names under the registry's exposed schema.
    async fn list_cubes(&self, ctx: &RequestContext, registry: &Registry) -> Result<Vec<String>>;

    /// Fetches one cube's field and policy document at a given revision.
    async fn fetch_cube(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_name: &str,
        cube_version: u32,
    ) -> Result<CubeDocument>;

    /// Posts a compiled query with `forceRevision = cube_version`.
    async fn execute(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_version: u32,
        query: &QueryDocument,
    ) -> Result<QueryResponse>;
}

/// [`RemoteSchema`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: reqwest::Client,
}

impl Default for HttpRemoteClient {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl HttpRemoteClient {
    /// Creates a client with a per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Creates a client using the configured timeout.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(Duration::from_secs(config.request_timeout_secs))
    }

    /// Sends a request with identity headers and returns the non-empty body of
    /// a 2xx response.
    async fn send(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        request: RequestBuilder,
    ) -> Result<Vec<u8>> {
        let request = ctx
            .headers()
            .into_iter()
            .fold(request, |request, (name, value)| request.header(name, value));

        let response = request.send().await.map_err(|e| {
            let what = if e.is_timeout() { "timed out" } else { "failed" };
            Error::remote_unavailable(
                registry.name.clone(),
                ctx.request_id(),
                format!("request {what}: {e}"),
            )
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            Error::remote_unavailable(
                registry.name.clone(),
                ctx.request_id(),
                format!("failed reading response body: {e}"),
            )
        })?;

        if !status.is_success() {
            let failure = serde_json::from_slice::<RemoteFailure>(&body).ok();
            let message = match failure {
                Some(failure) => failure.describe(),
                None if body.is_empty() => "empty response body".to_string(),
                None => String::from_utf8_lossy(&body).to_string(),
            };
            tracing::warn!(
                registry = %registry.name,
                request_id = ctx.request_id(),
                status = status.as_u16(),
                %message,
                "remote request rejected"
            );
            return Err(Error::RemoteUnavailable {
                registry: registry.name.clone(),
                request_id: ctx.request_id().to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {status}: {message}"),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::remote_data_invalid(
                registry.name.clone(),
                ctx.request_id(),
                "empty response body",
            ));
        }
        Ok(body.to_vec())
    }
}

fn decode<T: DeserializeOwned>(
    ctx: &RequestContext,
    registry: &Registry,
    what: &str,
    body: &[u8],
) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        Error::remote_data_invalid(
            registry.name.clone(),
            ctx.request_id(),
            format!("malformed {what}: {e}"),
        )
    })
}

#[async_trait]
impl RemoteSchema for HttpRemoteClient {
    async fn ping(&self, ctx: &RequestContext, registry: &Registry) -> Result<()> {
        let url = registry.domain_url();
        tracing::debug!(registry = %registry.name, request_id = ctx.request_id(), %url, "ping");
        self.send(ctx, registry, self.client.get(url)).await?;
        Ok(())
    }

    async fn list_cubes(&self, ctx: &RequestContext, registry: &Registry) -> Result<Vec<String>> {
        let url = registry.domain_url();
        tracing::debug!(registry = %registry.name, request_id = ctx.request_id(), %url, "list cubes");
        let body = self.send(ctx, registry, self.client.get(url)).await?;
        let domain: DomainDocument = decode(ctx, registry, "cube list", &body)?;
        domain
            .cubes(&registry.exposed_schema)
            .map(<[String]>::to_vec)
            .ok_or_else(|| {
                Error::remote_data_invalid(
                    registry.name.clone(),
                    ctx.request_id(),
                    format!("cube list has no schema '{}'", registry.exposed_schema),
                )
            })
    }

    async fn fetch_cube(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_name: &str,
        cube_version: u32,
    ) -> Result<CubeDocument> {
        let url = registry.cube_url(cube_name, cube_version);
        tracing::debug!(
            registry = %registry.name,
            cube = cube_name,
            request_id = ctx.request_id(),
            %url,
            "fetch cube"
        );
        let body = self.send(ctx, registry, self.client.get(url)).await?;
        decode(ctx, registry, &format!("document for cube '{cube_name}'"), &body)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        cube_version: u32,
        query: &QueryDocument,
    ) -> Result<QueryResponse> {
        let request = self
            .client
            .post(registry.sync_url())
            .query(&[("forceRevision", cube_version)])
            .json(query);
        tracing::debug!(
            registry = %registry.name,
            cube = %query.cube,
            request_id = ctx.request_id(),
            "execute query"
        );
        let body = self.send(ctx, registry, request).await?;
        let response: QueryResponse = decode(ctx, registry, "query response", &body)?;
        response.check_shape().map_err(|message| {
            Error::remote_data_invalid(registry.name.clone(), ctx.request_id(), message)
        })?;
        Ok(response)
    }
}
