use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use commons::DepgraphError;
use depgraph_cache::Cache;
use graph::Package;
use http_adapter::normalize::normalize_pkg_name;
use http_adapter::HttpAdapter;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::Fetcher;

const DEFAULT_BASE_URL: &str = "https://pypi.org";

pub struct PypiFetcher {
    http: HttpAdapter,
    base_url: String,
}

impl PypiFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_base_url(cache, ttl, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: Arc<dyn Cache>, ttl: Duration, base_url: impl Into<String>) -> Self {
        PypiFetcher {
            http: HttpAdapter::new(cache, "pypi", ttl)
                .with_default_header("Accept", "application/json"),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct PypiResponse {
    info: PypiInfo,
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct PypiInfo {
    version: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    home_page: Option<String>,
}

#[async_trait]
impl Fetcher for PypiFetcher {
    fn name(&self) -> &str {
        "pypi"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let canonical = normalize_pkg_name(name);
        let url = format!("{}/pypi/{}/json", self.base_url, canonical);

        let response: PypiResponse = self
            .http
            .cached(token, &canonical, refresh, || async { self.http.get(token, &url).await })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let dependencies = response
            .requires_dist
            .map(|entries| parse_requires_dist(&entries))
            .unwrap_or_default();

        Ok(Package {
            name: canonical,
            version: response.info.version,
            dependencies,
            description: response.info.summary,
            license: response.info.license,
            author: response.info.author,
            repository: response.info.home_page.clone(),
            homepage: response.info.home_page,
            ..Default::default()
        })
    }
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("pypi package {}", name)),
        other => other,
    }
}

/// Parse `requires_dist` entries into deduplicated canonical dependency
/// names, excluding anything gated behind an `extra`/`dev`/`test` marker.
fn parse_requires_dist(entries: &[String]) -> Vec<String> {
    let name_re = Regex::new(r"^[A-Za-z0-9_-]+").expect("valid regex");
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for entry in entries {
        let mut parts = entry.splitn(2, ';');
        let name_part = parts.next().unwrap_or_default().trim();
        if let Some(marker) = parts.next() {
            let marker = marker.to_lowercase();
            if marker.contains("extra") || marker.contains("dev") || marker.contains("test") {
                continue;
            }
        }
        let Some(m) = name_re.find(name_part) else {
            continue;
        };
        let dep = normalize_pkg_name(m.as_str());
        if seen.insert(dep.clone()) {
            result.push(dep);
        }
    }
    result
}
