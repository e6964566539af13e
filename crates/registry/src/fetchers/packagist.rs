use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use commons::DepgraphError;
use depgraph_cache::Cache;
use graph::Package;
use http_adapter::HttpAdapter;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::Fetcher;

const DEFAULT_BASE_URL: &str = "https://repo.packagist.org";

pub struct PackagistFetcher {
    http: HttpAdapter,
    base_url: String,
}

impl PackagistFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_base_url(cache, ttl, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: Arc<dyn Cache>, ttl: Duration, base_url: impl Into<String>) -> Self {
        PackagistFetcher {
            http: HttpAdapter::new(cache, "packagist", ttl),
            base_url: base_url.into(),
        }
    }
}

fn canonicalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Deserialize, Serialize)]
struct P2Response {
    packages: BTreeMap<String, Vec<P2Version>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct P2Version {
    version: String,
    #[serde(default)]
    require: BTreeMap<String, String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    license: Option<serde_json::Value>,
    #[serde(default)]
    authors: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    source: Option<serde_json::Value>,
}

fn is_stable(version: &str) -> bool {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let numeric = NUMERIC.get_or_init(|| Regex::new(r"\d+\.\d+").expect("valid regex"));
    !version.to_lowercase().contains("dev") && numeric.is_match(version)
}

fn excluded_require(key: &str) -> bool {
    key == "php"
        || key == "composer-plugin-api"
        || key == "composer-runtime-api"
        || key.starts_with("ext-")
        || key.starts_with("lib-")
        || !key.contains('/')
}

#[async_trait]
impl Fetcher for PackagistFetcher {
    fn name(&self) -> &str {
        "packagist"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let canonical = canonicalize(name);
        let url = format!("{}/p2/{}.json", self.base_url, canonical);

        let response: P2Response = self
            .http
            .cached(token, &canonical, refresh, || async { self.http.get(token, &url).await })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let versions = response.packages.get(&canonical).ok_or_else(|| {
            DepgraphError::NotFound(format!("packagist package {}", canonical))
        })?;

        let chosen = versions
            .iter()
            .find(|v| is_stable(&v.version))
            .or_else(|| versions.first())
            .ok_or_else(|| DepgraphError::NotFound(format!("packagist package {}", canonical)))?;

        let dependencies: Vec<String> = chosen
            .require
            .keys()
            .filter(|k| !excluded_require(k))
            .cloned()
            .collect();

        let license = chosen.license.as_ref().and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(a) => a.first().and_then(|x| x.as_str()).map(String::from),
            _ => None,
        });
        let author = chosen.authors.as_ref().and_then(|a| {
            a.first()
                .and_then(|v| v.get("name"))
                .and_then(|v| v.as_str())
                .map(String::from)
        });
        let repository = chosen
            .source
            .as_ref()
            .and_then(|s| s.get("url"))
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(Package {
            name: canonical,
            version: chosen.version.clone(),
            dependencies,
            description: chosen.description.clone(),
            license,
            author,
            repository: repository.clone(),
            homepage: chosen.homepage.clone().or(repository),
            ..Default::default()
        })
    }
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("packagist package {}", name)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_version_detection() {
        assert!(is_stable("1.0.0"));
        assert!(!is_stable("dev-master"));
        assert!(!is_stable("1.x-dev"));
    }

    #[test]
    fn excludes_platform_and_extension_requirements() {
        assert!(excluded_require("php"));
        assert!(excluded_require("ext-json"));
        assert!(excluded_require("lib-curl"));
        assert!(excluded_require("composer-plugin-api"));
        assert!(excluded_require("justaname"));
        assert!(!excluded_require("monolog/monolog"));
    }

    #[tokio::test]
    async fn fetch_prefers_first_stable_version() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/p2/me/app.json")
            .with_status(200)
            .with_body(
                r#"{"packages":{"me/app":[{"version":"dev-main","require":{"php":"^8.1"}},{"version":"1.2.0","require":{"php":"^8.1","monolog/monolog":"^2.0","ext-json":"*"}}]}}"#,
            )
            .create_async()
            .await;

        let fetcher = PackagistFetcher::with_base_url(
            Arc::new(depgraph_cache::NullCache),
            Duration::from_secs(60),
            server.url(),
        );
        let token = CancellationToken::new();
        let pkg = fetcher.fetch(&token, "me/app", false).await.unwrap();
        assert_eq!(pkg.version, "1.2.0");
        assert_eq!(pkg.dependencies, vec!["monolog/monolog".to_string()]);
    }
}
