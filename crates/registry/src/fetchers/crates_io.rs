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

const DEFAULT_BASE_URL: &str = "https://crates.io";

pub struct CratesIoFetcher {
    http: HttpAdapter,
    base_url: String,
}

impl CratesIoFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_base_url(cache, ttl, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: Arc<dyn Cache>, ttl: Duration, base_url: impl Into<String>) -> Self {
        CratesIoFetcher {
            // crates.io requires a descriptive User-Agent on every request.
            http: HttpAdapter::new(cache, "crates.io", ttl)
                .with_default_header("User-Agent", "depgraph (https://github.com/openshift/cincinnati)"),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateSummary,
    #[serde(default)]
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CrateSummary {
    max_version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    repository: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CrateVersion {
    num: String,
    #[serde(default)]
    license: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct DependenciesResponse {
    dependencies: Vec<CrateDependency>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CrateDependency {
    #[serde(rename = "crate_id")]
    crate_id: String,
    kind: String,
    #[serde(default)]
    optional: bool,
}

#[async_trait]
impl Fetcher for CratesIoFetcher {
    fn name(&self) -> &str {
        "crates.io"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let canonical = name.to_string();
        let url = format!("{}/api/v1/crates/{}", self.base_url, canonical);

        let response: CrateResponse = self
            .http
            .cached(token, &canonical, refresh, || async { self.http.get(token, &url).await })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let max_version = response.krate.max_version.clone();
        let license = response
            .versions
            .iter()
            .find(|v| v.num == max_version)
            .and_then(|v| v.license.clone());

        // Best-effort: a failure here must not fail the whole fetch.
        let dependencies = self
            .fetch_dependencies(token, &canonical, &max_version, refresh)
            .await
            .unwrap_or_default();

        Ok(Package {
            name: canonical,
            version: max_version,
            dependencies,
            description: response.krate.description,
            license,
            repository: response.krate.repository.clone(),
            homepage: response.krate.homepage.or(response.krate.repository),
            ..Default::default()
        })
    }
}

impl CratesIoFetcher {
    async fn fetch_dependencies(
        &self,
        token: &CancellationToken,
        name: &str,
        version: &str,
        refresh: bool,
    ) -> Result<Vec<String>, DepgraphError> {
        let url = format!(
            "{}/api/v1/crates/{}/{}/dependencies",
            self.base_url, name, version
        );
        let key = format!("{}:{}:deps", name, version);
        let response: DependenciesResponse = self
            .http
            .cached(token, &key, refresh, || async { self.http.get(token, &url).await })
            .await?;

        Ok(response
            .dependencies
            .into_iter()
            .filter(|d| d.kind == "normal" && !d.optional)
            .map(|d| d.crate_id)
            .collect())
    }
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("crates.io crate {}", name)),
        other => other,
    }
}
