use std::collections::HashSet;
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

const DEFAULT_BASE_URL: &str = "https://rubygems.org";

pub struct RubyGemsFetcher {
    http: HttpAdapter,
    base_url: String,
}

impl RubyGemsFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_base_url(cache, ttl, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: Arc<dyn Cache>, ttl: Duration, base_url: impl Into<String>) -> Self {
        RubyGemsFetcher {
            http: HttpAdapter::new(cache, "rubygems", ttl),
            base_url: base_url.into(),
        }
    }
}

fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Deserialize, Serialize)]
struct GemResponse {
    version: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    licenses: Option<Vec<String>>,
    #[serde(default)]
    authors: Option<String>,
    #[serde(default)]
    homepage_uri: Option<String>,
    #[serde(default)]
    source_code_uri: Option<String>,
    #[serde(default)]
    dependencies: GemDependencies,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct GemDependencies {
    #[serde(default)]
    runtime: Vec<GemDependency>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GemDependency {
    name: String,
}

#[async_trait]
impl Fetcher for RubyGemsFetcher {
    fn name(&self) -> &str {
        "rubygems"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let canonical = canonicalize(name);
        let url = format!("{}/api/v1/gems/{}.json", self.base_url, canonical);

        let response: GemResponse = self
            .http
            .cached(token, &canonical, refresh, || async { self.http.get(token, &url).await })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let mut seen = HashSet::new();
        let dependencies: Vec<String> = response
            .dependencies
            .runtime
            .into_iter()
            .map(|d| d.name.to_lowercase())
            .filter(|n| seen.insert(n.clone()))
            .collect();

        Ok(Package {
            name: canonical,
            version: response.version,
            dependencies,
            description: response.info,
            license: response.licenses.and_then(|l| l.into_iter().next()),
            author: response.authors,
            repository: response.source_code_uri.clone(),
            homepage: response.homepage_uri.or(response.source_code_uri),
            ..Default::default()
        })
    }
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("rubygems gem {}", name)),
        other => other,
    }
}
