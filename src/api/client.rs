// NativiWeb API HTTP client.
// Handles auth injection, error classification, response caching, and downloads.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::SessionProvider;
use crate::cache::{TtlCache, keys};
use crate::config::{CacheTtls, ClientConfig};
use crate::error::{ApiError, Result};

use super::classify::{ResponseKind, classify_status, classify_transport};
use super::download::{self, DownloadProgress, DownloadedFile};

/// Client for the NativiWeb backend.
///
/// Cloning is cheap; clones share the HTTP connection pool, the response
/// cache, and the session provider.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: String,
    api_base: String,
    cache: TtlCache<Value>,
    session: Arc<dyn SessionProvider>,
    ttls: CacheTtls,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base", &self.inner.api_base)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

impl ApiClient {
    /// Create a client using the given cache instance and session source.
    pub fn new(
        config: &ClientConfig,
        cache: TtlCache<Value>,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("nativiweb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_base: config.api_base(),
                cache,
                session,
                ttls: config.cache_ttls(),
            }),
        })
    }

    /// Backend origin, as shown in "backend unavailable" messages.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.inner.cache
    }

    pub fn ttls(&self) -> CacheTtls {
        self.inner.ttls
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.api_base, path)
    }

    /// Attach the bearer token if one is available.
    ///
    /// A missing session or a failing provider does not block the request;
    /// public endpoints work without it.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.inner.session.get_session().await {
            Ok(Some(session)) => request.bearer_auth(session.access_token),
            Ok(None) => {
                tracing::trace!("no active session, sending request without token");
                request
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session, sending request without token");
                request
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.http.request(method, self.url(path))
    }

    /// Send a request through the full pipeline and return the successful response.
    async fn send(&self, request: RequestBuilder, kind: ResponseKind) -> Result<Response> {
        let request = self
            .authorize(request)
            .await
            .build()
            .map_err(|e| ApiError::Other(format!("invalid request: {}", e)))?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        tracing::debug!(%method, path = %path, "sending request");
        let response = self.inner.http.execute(request).await.map_err(|e| {
            let err = classify_transport(&e, &self.inner.base_url);
            self.observe(&method, &path, &err);
            err
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Download errors arrive as raw bytes; JSON errors are decoded from bytes too
        let body = response.bytes().await.unwrap_or_default();
        let err = classify_status(status, &body, kind);
        self.observe(&method, &path, &err);
        Err(err)
    }

    /// Log classified failures. Never changes session or application state.
    fn observe(&self, method: &Method, path: &str, err: &ApiError) {
        match err {
            ApiError::Connection { base_url, detail } => {
                tracing::error!(%method, path, base_url = %base_url, detail = %detail, "backend unreachable");
            }
            ApiError::Unauthorized { message } => {
                // Session teardown is the caller's decision
                tracing::warn!(%method, path, message = %message, "request unauthorized");
            }
            ApiError::Forbidden { message } => {
                tracing::warn!(%method, path, message = %message, "request forbidden");
            }
            ApiError::Timeout => {
                tracing::warn!(%method, path, "request timed out");
            }
            other => {
                tracing::debug!(%method, path, error = %other, "request failed");
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Decode(e.to_string())
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GET and decode a JSON response, bypassing the cache.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .send(self.request(Method::GET, path), ResponseKind::Json)
            .await?;
        Self::decode(response).await
    }

    /// GET with query parameters, bypassing the cache.
    pub async fn get_json_with_params<T, Q>(&self, path: &str, params: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .send(
                self.request(Method::GET, path).query(params),
                ResponseKind::Json,
            )
            .await?;
        Self::decode(response).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let response = self
            .send(self.request(Method::POST, path).json(body), ResponseKind::Json)
            .await?;
        Self::decode(response).await
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let response = self
            .send(self.request(Method::PUT, path).json(body), ResponseKind::Json)
            .await?;
        Self::decode(response).await
    }

    /// DELETE a resource. Any response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path), ResponseKind::Json)
            .await?;
        Ok(())
    }

    /// GET through the response cache.
    ///
    /// A valid entry under `key` is returned without a network call; otherwise
    /// the response is fetched and cached for `ttl`.
    pub async fn get_cached<T: DeserializeOwned>(
        &self,
        key: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<T> {
        self.cached(key, ttl, self.get_json::<Value>(path)).await
    }

    /// [`ApiClient::get_cached`] with query parameters.
    pub async fn get_cached_with_params<T, Q>(
        &self,
        key: &str,
        path: &str,
        params: &Q,
        ttl: Duration,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.cached(key, ttl, self.get_json_with_params::<Value, Q>(path, params))
            .await
    }

    async fn cached<T, F>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.inner.cache.get(key) {
            match serde_json::from_value(value) {
                Ok(data) => {
                    tracing::debug!(key, "cache hit");
                    return Ok(data);
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "cached value did not decode, refetching");
                    self.inner.cache.delete(key);
                }
            }
        }

        tracing::debug!(key, "cache miss");
        // A write that lands while this read is in flight wins over its result
        let generation = self.inner.cache.generation();
        let value = fetch.await?;
        let data = serde_json::from_value(value.clone())
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.inner.cache.set_if_generation(key, value, ttl, generation);
        Ok(data)
    }

    /// Drop cached reads for a resource after a write.
    ///
    /// Removes the detail key for `id` (if given) and every key in the namespace.
    pub fn invalidate(&self, namespace: &str, id: Option<&str>) {
        if let Some(id) = id {
            self.inner.cache.delete(&keys::detail(namespace, id));
        }
        self.inner.cache.invalidate_pattern(&keys::prefix(namespace));
    }

    /// Download a binary resource into memory.
    pub async fn download(&self, path: &str, fallback_name: &str) -> Result<DownloadedFile> {
        let response = self
            .send(self.request(Method::GET, path), ResponseKind::Binary)
            .await?;
        let filename = download::response_filename(&response, fallback_name);
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Decode(format!("download interrupted: {}", e))
            }
        })?;

        tracing::info!(path, filename = %filename, bytes = bytes.len(), "download complete");
        Ok(DownloadedFile {
            filename,
            bytes: bytes.to_vec(),
        })
    }

    /// Download a binary resource, reporting progress after every chunk.
    pub async fn download_with_progress<F>(
        &self,
        path: &str,
        fallback_name: &str,
        on_progress: F,
    ) -> Result<DownloadedFile>
    where
        F: FnMut(DownloadProgress),
    {
        let response = self
            .send(self.request(Method::GET, path), ResponseKind::Binary)
            .await?;
        let filename = download::response_filename(&response, fallback_name);
        let bytes = download::read_with_progress(response, on_progress).await?;

        tracing::info!(path, filename = %filename, bytes = bytes.len(), "download complete");
        Ok(DownloadedFile { filename, bytes })
    }
}
