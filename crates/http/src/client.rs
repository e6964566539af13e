use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use depgraph_cache::{http_key, Cache};
use commons::{DepgraphError, RateLimited, RetryableError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Per-request timeout ceiling applied independent of the ambient
/// cancellation token; the effective deadline is the earlier of the two.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A reusable client for one registry fetcher: a pooled connector, a
/// namespaced cache, a set of default headers, and the TTL new cache
/// writes get.
///
/// Built once per ecosystem and shared across concurrent `Fetch` calls.
#[derive(Clone)]
pub struct HttpAdapter {
    client: Client,
    cache: Arc<dyn Cache>,
    namespace: String,
    default_headers: HashMap<String, String>,
    ttl: Duration,
}

impl HttpAdapter {
    /// `cache` should already be scoped (e.g. via [`cache::namespaced`]) if
    /// it is shared across ecosystems; `namespace` additionally prefixes
    /// the HTTP-response key kind so a crawler-wide cache directory never
    /// confuses an npm response with a crates.io one of the same name.
    pub fn new(cache: Arc<dyn Cache>, namespace: impl Into<String>, ttl: Duration) -> Self {
        HttpAdapter {
            client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("building the default reqwest client never fails"),
            cache,
            namespace: namespace.into(),
            default_headers: HashMap::new(),
            ttl,
        }
    }

    /// Install a default header (e.g. `User-Agent`) sent on every request
    /// unless overridden per-call.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Read-through cache wrapper around one fetch.
    ///
    /// Unless `refresh`, attempts a cache read first; on a hit, decodes
    /// the stored bytes as JSON. On a miss (or `refresh`), calls `fetch`
    /// wrapped in [`retry::retry_with_backoff`], then best-effort writes
    /// the JSON-encoded result back to the cache. Cache write failures are
    /// swallowed; cache read failures (corruption aside, which the cache
    /// itself treats as a miss) propagate.
    pub async fn cached<T, F, Fut>(
        &self,
        token: &CancellationToken,
        key: &str,
        refresh: bool,
        fetch: F,
    ) -> Result<T, DepgraphError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DepgraphError>>,
    {
        let cache_key = http_key(&self.namespace, key);

        if !refresh {
            if let Some(bytes) = self.cache.get(&cache_key)? {
                match serde_json::from_slice::<T>(&bytes) {
                    Ok(value) => return Ok(value),
                    Err(e) => {
                        log::debug!("cache entry for {} failed to decode, refetching: {}", key, e);
                    }
                }
            }
        }

        let value = retry::retry_with_backoff(token, fetch).await?;

        match serde_json::to_vec(&value) {
            Ok(encoded) => {
                if let Err(e) = self.cache.set(&cache_key, &encoded, self.ttl) {
                    log::debug!("failed to write cache entry for {}: {}", key, e);
                }
            }
            Err(e) => log::debug!("failed to encode cache entry for {}: {}", key, e),
        }

        Ok(value)
    }

    /// GET `url` with only the default headers, decoding the body as JSON.
    pub async fn get<T: DeserializeOwned>(
        &self,
        token: &CancellationToken,
        url: &str,
    ) -> Result<T, DepgraphError> {
        self.get_with_headers(token, url, &HashMap::new()).await
    }

    /// GET `url`, merging `extra_headers` over the defaults (extras win),
    /// decoding the body as JSON.
    pub async fn get_with_headers<T: DeserializeOwned>(
        &self,
        token: &CancellationToken,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<T, DepgraphError> {
        let body = self.get_bytes(token, url, extra_headers).await?;
        serde_json::from_slice(&body).map_err(|e| DepgraphError::Decode(e.to_string()))
    }

    /// GET `url`, returning the raw response body as text.
    pub async fn get_text(
        &self,
        token: &CancellationToken,
        url: &str,
    ) -> Result<String, DepgraphError> {
        let body = self.get_bytes(token, url, &HashMap::new()).await?;
        String::from_utf8(body).map_err(|e| DepgraphError::Decode(e.to_string()))
    }

    async fn get_bytes(
        &self,
        token: &CancellationToken,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, DepgraphError> {
        let mut request = self.client.get(url);
        for (name, value) in &self.default_headers {
            request = request.header(name, value);
        }
        for (name, value) in extra_headers {
            request = request.header(name, value);
        }

        let response = tokio::select! {
            result = request.send() => result.map_err(classify_transport_error)?,
            _ = token.cancelled() => return Err(DepgraphError::Other(anyhow::anyhow!("request to {} cancelled", url))),
        };

        match response.status() {
            StatusCode::OK => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(classify_transport_error),
            StatusCode::NOT_FOUND => Err(DepgraphError::NotFound(url.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                Err(DepgraphError::RateLimited(RateLimited { retry_after }))
            }
            status if status.is_server_error() => {
                let message = response.text().await.unwrap_or_default();
                Err(DepgraphError::Network(RetryableError::new(HttpStatusError {
                    status: status.as_u16(),
                    message,
                })))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(DepgraphError::Http {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> DepgraphError {
    DepgraphError::Network(RetryableError::new(TransportError(err.to_string())))
}

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
struct TransportError(String);

#[derive(Debug, thiserror::Error)]
#[error("http {status}: {message}")]
struct HttpStatusError {
    status: u16,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use depgraph_cache::NullCache;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
    }

    fn adapter() -> HttpAdapter {
        HttpAdapter::new(Arc::new(NullCache), "test", Duration::from_secs(60))
            .with_default_header("User-Agent", "depgraph-test")
    }

    #[tokio::test]
    async fn get_decodes_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pkg")
            .with_status(200)
            .with_body(r#"{"name":"foo"}"#)
            .create_async()
            .await;

        let token = CancellationToken::new();
        let result: Payload = adapter()
            .get(&token, &format!("{}/pkg", server.url()))
            .await
            .unwrap();
        assert_eq!(result, Payload { name: "foo".into() });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_maps_to_err_not_found() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/missing").with_status(404).create_async().await;

        let token = CancellationToken::new();
        let result: Result<Payload, _> = adapter()
            .get(&token, &format!("{}/missing", server.url()))
            .await;
        assert!(matches!(result, Err(DepgraphError::NotFound(_))));
    }

    #[tokio::test]
    async fn rate_limited_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/busy")
            .with_status(429)
            .with_header("Retry-After", "30")
            .create_async()
            .await;

        let token = CancellationToken::new();
        let result: Result<Payload, _> = adapter()
            .get(&token, &format!("{}/busy", server.url()))
            .await;
        match result {
            Err(DepgraphError::RateLimited(r)) => assert_eq!(r.retry_after, Some(30)),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_errors_are_retryable_and_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let token = CancellationToken::new();
        let result: Result<Payload, _> = adapter()
            .get(&token, &format!("{}/flaky", server.url()))
            .await;
        assert!(result.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cached_round_trips_through_fetch_closure() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = AtomicU32::new(0);
        let adapter = adapter();
        let token = CancellationToken::new();

        let first: Payload = adapter
            .cached(&token, "pkg", false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Payload { name: "foo".into() }) }
            })
            .await
            .unwrap();
        assert_eq!(first, Payload { name: "foo".into() });
        // NullCache never hits, so the closure still runs once per call.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
