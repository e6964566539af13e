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

const DEFAULT_SOLR_URL: &str = "https://search.maven.org";
const DEFAULT_REPO_URL: &str = "https://repo1.maven.org/maven2";

pub struct MavenFetcher {
    http: HttpAdapter,
    solr_url: String,
    repo_url: String,
}

impl MavenFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_urls(cache, ttl, DEFAULT_SOLR_URL, DEFAULT_REPO_URL)
    }

    pub fn with_urls(
        cache: Arc<dyn Cache>,
        ttl: Duration,
        solr_url: impl Into<String>,
        repo_url: impl Into<String>,
    ) -> Self {
        MavenFetcher {
            http: HttpAdapter::new(cache, "maven", ttl),
            solr_url: solr_url.into(),
            repo_url: repo_url.into(),
        }
    }
}

/// `groupId:artifactId`, split for use in the Solr query and repo path.
fn split_coordinate(name: &str) -> Result<(&str, &str), DepgraphError> {
    name.split_once(':').ok_or_else(|| {
        DepgraphError::Decode(format!(
            "maven coordinate {} is not in groupId:artifactId form",
            name
        ))
    })
}

#[derive(Debug, Deserialize, Serialize)]
struct SolrResponse {
    response: SolrResponseBody,
}

#[derive(Debug, Deserialize, Serialize)]
struct SolrResponseBody {
    docs: Vec<SolrDoc>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SolrDoc {
    #[serde(rename = "latestVersion", default)]
    latest_version: Option<String>,
    #[serde(rename = "v", default)]
    version: Option<String>,
}

#[async_trait]
impl Fetcher for MavenFetcher {
    fn name(&self) -> &str {
        "maven"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let (group, artifact) = split_coordinate(name)?;
        let canonical = format!("{}:{}", group, artifact);

        let query = http_adapter::normalize::url_encode(&format!(
            "g:\"{}\" AND a:\"{}\"",
            group, artifact
        ));
        let search_url = format!(
            "{}/solrsearch/select?q={}&rows=1&wt=json",
            self.solr_url, query
        );

        let search: SolrResponse = self
            .http
            .cached(token, &canonical, refresh, || async {
                self.http.get(token, &search_url).await
            })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let doc = search
            .response
            .docs
            .first()
            .ok_or_else(|| DepgraphError::NotFound(format!("maven artifact {}", canonical)))?;
        let version = doc
            .latest_version
            .clone()
            .or_else(|| doc.version.clone())
            .ok_or_else(|| {
                DepgraphError::Decode(format!("{} has no resolvable version", canonical))
            })?;

        // POM fetch (and its parse) is best-effort: a malformed or missing
        // POM must not fail the overall fetch, only leave dependencies empty.
        let dependencies = self
            .fetch_pom_dependencies(token, group, artifact, &version, refresh)
            .await
            .unwrap_or_default();

        Ok(Package {
            name: canonical,
            version,
            dependencies,
            ..Default::default()
        })
    }
}

impl MavenFetcher {
    async fn fetch_pom_dependencies(
        &self,
        token: &CancellationToken,
        group: &str,
        artifact: &str,
        version: &str,
        refresh: bool,
    ) -> Result<Vec<String>, DepgraphError> {
        let group_path = group.replace('.', "/");
        let pom_url = format!(
            "{}/{}/{}/{}/{}-{}.pom",
            self.repo_url, group_path, artifact, version, artifact, version
        );

        // POM bodies are XML, not JSON, so they bypass the JSON-shaped
        // `Cached` wrapper and go through retry/backoff directly; `refresh`
        // has no read-path to bypass here since nothing was read from cache.
        let _ = refresh;
        let pom_text =
            retry::retry_with_backoff(token, || async { self.http.get_text(token, &pom_url).await })
                .await?;

        Ok(parse_pom_dependencies(&pom_text))
    }
}

fn parse_pom_dependencies(xml: &str) -> Vec<String> {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("failed to parse POM xml: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for deps_node in doc
        .descendants()
        .filter(|n| n.has_tag_name("dependencies"))
    {
        // Skip <dependencyManagement><dependencies>; only direct deps count.
        if deps_node
            .parent()
            .is_some_and(|p| p.has_tag_name("dependencyManagement"))
        {
            continue;
        }

        for dep in deps_node.children().filter(|n| n.has_tag_name("dependency")) {
            let text = |tag: &str| {
                dep.children()
                    .find(|n| n.has_tag_name(tag))
                    .and_then(|n| n.text())
                    .map(str::trim)
                    .unwrap_or_default()
            };

            let scope = text("scope");
            if scope == "test" || scope == "provided" {
                continue;
            }
            if text("optional") == "true" {
                continue;
            }

            let group_id = text("groupId");
            let artifact_id = text("artifactId");
            if group_id.is_empty() || artifact_id.is_empty() {
                continue;
            }
            if group_id.contains("${") || artifact_id.contains("${") {
                continue;
            }

            let coordinate = format!("{}:{}", group_id, artifact_id);
            if seen.insert(coordinate.clone()) {
                result.push(coordinate);
            }
        }
    }

    result
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("maven artifact {}", name)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_dependencies_skipping_test_and_optional() {
        let xml = r#"<project>
          <dependencies>
            <dependency><groupId>com.fasterxml.jackson.core</groupId><artifactId>jackson-databind</artifactId></dependency>
            <dependency><groupId>junit</groupId><artifactId>junit</artifactId><scope>test</scope></dependency>
            <dependency><groupId>org.foo</groupId><artifactId>bar</artifactId><optional>true</optional></dependency>
            <dependency><groupId>${parent.groupId}</groupId><artifactId>unresolved</artifactId></dependency>
          </dependencies>
        </project>"#;
        let deps = parse_pom_dependencies(xml);
        assert_eq!(deps, vec!["com.fasterxml.jackson.core:jackson-databind".to_string()]);
    }

    #[test]
    fn ignores_dependency_management_block() {
        let xml = r#"<project>
          <dependencyManagement>
            <dependencies>
              <dependency><groupId>a</groupId><artifactId>b</artifactId></dependency>
            </dependencies>
          </dependencyManagement>
          <dependencies>
            <dependency><groupId>c</groupId><artifactId>d</artifactId></dependency>
          </dependencies>
        </project>"#;
        let deps = parse_pom_dependencies(xml);
        assert_eq!(deps, vec!["c:d".to_string()]);
    }

    #[tokio::test]
    async fn fetch_resolves_latest_version_from_solr() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"response":{"docs":[{"latestVersion":"2.17.0"}]}}"#)
            .create_async()
            .await;

        let fetcher = MavenFetcher::with_urls(
            Arc::new(depgraph_cache::NullCache),
            Duration::from_secs(60),
            server.url(),
            server.url(),
        );
        let token = CancellationToken::new();
        let pkg = fetcher
            .fetch(&token, "com.fasterxml.jackson.core:jackson-databind", false)
            .await
            .unwrap();
        assert_eq!(pkg.version, "2.17.0");
    }
}
