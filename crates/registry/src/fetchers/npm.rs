use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use commons::DepgraphError;
use depgraph_cache::Cache;
use graph::Package;
use http_adapter::HttpAdapter;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::Fetcher;

const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";

pub struct NpmFetcher {
    http: HttpAdapter,
    base_url: String,
}

impl NpmFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_base_url(cache, ttl, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: Arc<dyn Cache>, ttl: Duration, base_url: impl Into<String>) -> Self {
        NpmFetcher {
            http: HttpAdapter::new(cache, "npm", ttl),
            base_url: base_url.into(),
        }
    }
}

fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Deserialize, Serialize)]
struct NpmResponse {
    #[serde(rename = "dist-tags")]
    dist_tags: BTreeMap<String, String>,
    versions: BTreeMap<String, NpmVersion>,
}

#[derive(Debug, Deserialize, Serialize)]
struct NpmVersion {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    license: Option<serde_json::Value>,
    #[serde(default)]
    author: Option<serde_json::Value>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    repository: Option<serde_json::Value>,
}

fn value_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("type"))
            .or_else(|| map.get("url"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Fetcher for NpmFetcher {
    fn name(&self) -> &str {
        "npm"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let canonical = canonicalize(name);
        let url = format!("{}/{}", self.base_url, canonical);

        let response: NpmResponse = self
            .http
            .cached(token, &canonical, refresh, || async { self.http.get(token, &url).await })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let latest = response
            .dist_tags
            .get("latest")
            .cloned()
            .ok_or_else(|| DepgraphError::Decode(format!("{} has no dist-tags.latest", canonical)))?;

        let version_entry = response.versions.get(&latest).ok_or_else(|| {
            DepgraphError::Decode(format!("{} is missing versions[{}]", canonical, latest))
        })?;

        let dependencies: Vec<String> = version_entry.dependencies.keys().cloned().collect();

        Ok(Package {
            name: canonical,
            version: latest,
            dependencies,
            description: version_entry.description.clone(),
            license: version_entry.license.as_ref().and_then(value_to_string),
            author: version_entry.author.as_ref().and_then(value_to_string),
            repository: version_entry.repository.as_ref().and_then(value_to_string),
            homepage: version_entry.homepage.clone(),
            ..Default::default()
        })
    }
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("npm package {}", name)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_resolves_latest_dist_tag() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/left-pad")
            .with_status(200)
            .with_body(
                r#"{"dist-tags":{"latest":"1.3.0"},"versions":{"1.3.0":{"dependencies":{"string-length":"^1.0.0"},"license":"MIT"}}}"#,
            )
            .create_async()
            .await;

        let fetcher = NpmFetcher::with_base_url(
            Arc::new(depgraph_cache::NullCache),
            Duration::from_secs(60),
            server.url(),
        );
        let token = CancellationToken::new();
        let pkg = fetcher.fetch(&token, "left-pad", false).await.unwrap();
        assert_eq!(pkg.version, "1.3.0");
        assert_eq!(pkg.dependencies, vec!["string-length".to_string()]);
        assert_eq!(pkg.license.as_deref(), Some("MIT"));
    }

    #[test]
    fn value_to_string_handles_object_license() {
        let v: serde_json::Value = serde_json::json!({"type": "MIT", "url": "https://x"});
        assert_eq!(value_to_string(&v), Some("MIT".to_string()));
    }
}
