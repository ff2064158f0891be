//! Fetch routing: decides how each intercepted request is satisfied.
//!
//! API-prefixed requests go network-first with an API-partition fallback and
//! a synthesized 503. Other GET requests go cache-first against the static
//! partition. Everything else passes through untouched.

use std::sync::Arc;

use reqwest::Method;
use serde_json::json;

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::http::{Request, RequestKey, Response};
use crate::network::Network;
use crate::queue::SubmissionQueue;

/// Strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Network first, API partition on failure, then a 503.
    NetworkFirst,
    /// Static partition first, network on a miss.
    CacheFirst,
    /// Not intercepted.
    Passthrough,
}

/// Classifies a request by path prefix and method.
#[must_use]
pub fn route(config: &WorkerConfig, request: &Request) -> Route {
    if config.is_api_path(request.path()) {
        Route::NetworkFirst
    } else if request.is_get() {
        Route::CacheFirst
    } else {
        Route::Passthrough
    }
}

/// Applies the caching strategies against injected capabilities.
pub struct FetchRouter {
    config: Arc<WorkerConfig>,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    queue: Option<Arc<dyn SubmissionQueue>>,
}

impl FetchRouter {
    #[must_use]
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            caches,
            network,
            queue: None,
        }
    }

    /// Queues failed assessment submissions for background sync.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn SubmissionQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Handles an intercepted request.
    ///
    /// Returns `Ok(None)` for pass-through requests, which the caller should
    /// send to the network itself.
    ///
    /// # Errors
    ///
    /// Only a cache-first miss on a non-navigation request whose network
    /// fetch fails returns an error; every other failure degrades to a
    /// cached or synthesized response.
    pub async fn handle(&self, request: &Request) -> Result<Option<Response>> {
        let route = route(&self.config, request);
        log::debug!("{} {} -> {route:?}", request.method, request.url);
        match route {
            Route::NetworkFirst => self.network_first(request).await.map(Some),
            Route::CacheFirst => self.cache_first(request).await.map(Some),
            Route::Passthrough => Ok(None),
        }
    }

    /// Network-first with API-partition fallback.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the `Result` keeps the strategies uniform.
    pub async fn network_first(&self, request: &Request) -> Result<Response> {
        let partition = &self.config.api_cache_name();

        let error = match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && request.is_get() {
                    self.store(partition, request.key(), &response).await;
                }
                return Ok(response);
            }
            Err(e) => e,
        };

        log::warn!("Network failed for {}, trying cache: {error}", request.url);
        self.queue_submission(request).await;

        if request.is_get() {
            match self.caches.match_in(partition, &request.key()).await {
                Ok(Some(cached)) => return Ok(cached),
                Ok(None) => {}
                Err(e) => log::warn!("Cache lookup failed for {}: {e}", request.url),
            }
        }

        Ok(self.offline_api_response())
    }

    /// Cache-first with network fallback.
    ///
    /// # Errors
    ///
    /// Returns the network error when nothing is cached, the fetch fails and
    /// the request is not a navigation.
    pub async fn cache_first(&self, request: &Request) -> Result<Response> {
        let partition = &self.config.static_cache_name();
        let key = request.key();

        match self.caches.match_in(partition, &key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => log::warn!("Cache lookup failed for {}: {e}", request.url),
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(partition, key, &response).await;
                }
                Ok(response)
            }
            Err(e) => {
                log::warn!("Failed to fetch {}: {e}", request.url);
                if request.is_navigation() {
                    Ok(self.offline_navigation_response().await)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// The synthesized 503 returned to API calls while offline.
    #[must_use]
    pub fn offline_api_response(&self) -> Response {
        Response::json(
            503,
            &json!({
                "error": "Offline",
                "message": self.config.offline_message,
            }),
        )
        .with_status_text("Service Unavailable")
    }

    /// The cached offline page if any partition holds it, else the built-in one.
    pub async fn offline_navigation_response(&self) -> Response {
        if let Ok(url) = self.config.resolve(&self.config.offline_page) {
            match self.caches.match_any(&RequestKey::get(&url)).await {
                Ok(Some(page)) => return page,
                Ok(None) => {}
                Err(e) => log::warn!("Offline page lookup failed: {e}"),
            }
        }
        Response::html(self.config.offline_html.clone())
    }

    // Cache writes never fail the request that produced them
    async fn store(&self, partition: &str, key: RequestKey, response: &Response) {
        if let Err(e) = self.caches.put(partition, key, response.clone()).await {
            log::warn!("Failed to cache response in {partition}: {e}");
        }
    }

    async fn queue_submission(&self, request: &Request) {
        let Some(queue) = &self.queue else {
            return;
        };
        if request.method != Method::POST || request.path() != self.config.submission_endpoint {
            return;
        }
        let data: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Not queueing submission with invalid JSON body: {e}");
                return;
            }
        };
        match queue.enqueue(data).await {
            Ok(submission) => log::info!("Queued assessment {} for background sync", submission.id),
            Err(e) => log::error!("Failed to queue assessment submission: {e}"),
        }
    }
}
