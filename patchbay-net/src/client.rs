//! Network client: retry policy, response caching, update-service endpoints.

use crate::cache::ResponseCache;
use crate::error::{NetworkError, NetworkResult};
use crate::protocol::{UpdateCheckRequest, UpdateDescriptor, UpdatePackage};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use patchbay_config::DynamicConfiguration;
use patchbay_types::{ComponentId, DynamicComponent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct NetworkClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts per request, including the first.
    pub retry_attempts: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before retrying.
    pub retry_delay: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
}

impl Default for NetworkClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(5),
        }
    }
}

pub struct NetworkClient {
    config: NetworkClientConfig,
    transport: Arc<dyn HttpTransport>,
    cache: ResponseCache,
}

impl NetworkClient {
    /// Client over the production reqwest transport.
    #[must_use]
    pub fn new(config: NetworkClientConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.timeout));
        Self::with_transport(config, transport)
    }

    /// Client over an arbitrary transport; tests inject scripted ones.
    #[must_use]
    pub fn with_transport(config: NetworkClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let cache = ResponseCache::new(config.cache_ttl);
        Self {
            config,
            transport,
            cache,
        }
    }

    // ── Endpoints ────────────────────────────────────────────────

    pub async fn get_component(&self, id: &ComponentId) -> NetworkResult<DynamicComponent> {
        self.get_json(&format!("/components/{id}")).await
    }

    pub async fn get_component_version(
        &self,
        id: &ComponentId,
        version: &str,
    ) -> NetworkResult<DynamicComponent> {
        self.get_json(&format!("/components/{id}/{version}")).await
    }

    pub async fn check_updates(
        &self,
        request: &UpdateCheckRequest,
    ) -> NetworkResult<Vec<UpdateDescriptor>> {
        self.post_json("/updates/check", request).await
    }

    pub async fn get_update_package(&self, version: &str) -> NetworkResult<UpdatePackage> {
        self.get_json(&format!("/updates/{version}")).await
    }

    pub async fn get_configuration(&self, id: &str) -> NetworkResult<DynamicConfiguration> {
        self.get_json(&format!("/configurations/{id}")).await
    }

    pub async fn upload_component(&self, component: &DynamicComponent) -> NetworkResult<()> {
        let body = serde_json::to_vec(component)?;
        let url = format!("{}/components/{}", self.config.base_url, component.id);
        self.execute_with_retry(&HttpRequest::post(url, body))
            .await?;
        Ok(())
    }

    /// Downloads several components. The result vector matches the input
    /// order exactly, failures included.
    pub async fn download_batch(
        &self,
        ids: &[ComponentId],
    ) -> Vec<NetworkResult<DynamicComponent>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.get_component(id).await);
        }
        results
    }

    /// Uploads several components, preserving input order in the results.
    pub async fn upload_batch(&self, components: &[DynamicComponent]) -> Vec<NetworkResult<()>> {
        let mut results = Vec::with_capacity(components.len());
        for component in components {
            results.push(self.upload_component(component).await);
        }
        results
    }

    /// One uncached, unretried GET against the health endpoint.
    pub async fn probe_connectivity(&self) -> bool {
        let request = HttpRequest::get(format!("{}/health", self.config.base_url));
        match self.transport.execute(&request).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                false
            }
        }
    }

    /// Drops expired response-cache entries.
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // ── Request plumbing ─────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> NetworkResult<T> {
        let request = HttpRequest::get(format!("{}{path}", self.config.base_url));
        let signature = request.signature();

        if self.config.cache_enabled
            && let Some(body) = self.cache.get(&signature)
        {
            debug!(%signature, "response cache hit");
            return Ok(serde_json::from_slice(&body)?);
        }

        let response = self.execute_with_retry(&request).await?;
        if self.config.cache_enabled {
            self.cache.put(signature, response.body.clone());
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> NetworkResult<T> {
        let url = format!("{}{path}", self.config.base_url);
        let request = HttpRequest::post(url, serde_json::to_vec(body)?);
        let response = self.execute_with_retry(&request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Runs a request up to `retry_attempts` times. Attempt `n` sleeps
    /// `retry_delay * n` first, so the backoff grows linearly. Only
    /// retryable failures (timeout, connect, 5xx) are retried.
    async fn execute_with_retry(&self, request: &HttpRequest) -> NetworkResult<HttpResponse> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay * (attempt - 1)).await;
            }

            let outcome = match self.transport.execute(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => NetworkError::Status {
                    status: response.status,
                    message: String::from_utf8_lossy(&response.body).into_owned(),
                },
                Err(e) => e,
            };

            if !outcome.is_retryable() {
                return Err(outcome);
            }
            warn!(
                url = %request.url,
                attempt,
                error = %outcome,
                "request failed, will retry"
            );
            last_error = Some(outcome);
        }

        // attempts >= 1, so at least one failure was recorded.
        Err(last_error.unwrap_or(NetworkError::Timeout))
    }
}
