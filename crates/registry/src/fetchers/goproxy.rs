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

const DEFAULT_BASE_URL: &str = "https://proxy.golang.org";

pub struct GoProxyFetcher {
    http: HttpAdapter,
    base_url: String,
}

impl GoProxyFetcher {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self::with_base_url(cache, ttl, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: Arc<dyn Cache>, ttl: Duration, base_url: impl Into<String>) -> Self {
        GoProxyFetcher {
            http: HttpAdapter::new(cache, "goproxy", ttl),
            base_url: base_url.into(),
        }
    }
}

/// Go module proxy path escaping: every uppercase letter is replaced with
/// `!` followed by its lowercase form, since module paths are
/// case-sensitive but most filesystems (and the proxy's storage) are not.
fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Deserialize, Serialize)]
struct LatestResponse {
    #[serde(rename = "Version")]
    version: String,
}

#[async_trait]
impl Fetcher for GoProxyFetcher {
    fn name(&self) -> &str {
        "goproxy"
    }

    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError> {
        let canonical = name.trim().to_string();
        let escaped = escape_module_path(&canonical);

        let latest_url = format!("{}/{}/@latest", self.base_url, escaped);
        let latest: LatestResponse = self
            .http
            .cached(token, &canonical, refresh, || async {
                self.http.get(token, &latest_url).await
            })
            .await
            .map_err(|e| wrap_not_found(e, &canonical))?;

        let mod_url = format!(
            "{}/{}/@v/{}.mod",
            self.base_url, escaped, latest.version
        );
        // The go.mod fetch (and parse) is best-effort; a failure here
        // leaves dependencies empty rather than failing the whole fetch.
        let dependencies = retry::retry_with_backoff(token, || async {
            self.http.get_text(token, &mod_url).await
        })
        .await
        .map(|text| parse_go_mod_requires(&text))
        .unwrap_or_default();

        Ok(Package {
            name: canonical,
            version: latest.version,
            dependencies,
            ..Default::default()
        })
    }
}

fn wrap_not_found(err: DepgraphError, name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(_) => DepgraphError::NotFound(format!("go module {}", name)),
        other => other,
    }
}

fn parse_go_mod_requires(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    let mut in_block = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.starts_with("require (") {
            in_block = true;
            continue;
        }
        if in_block {
            if line == ")" {
                in_block = false;
                continue;
            }
            add_require_line(line, &mut seen, &mut result);
        } else if let Some(rest) = line.strip_prefix("require ") {
            add_require_line(rest, &mut seen, &mut result);
        }
    }

    result
}

fn add_require_line(line: &str, seen: &mut HashSet<String>, result: &mut Vec<String>) {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") {
        return;
    }
    if line.trim_end().ends_with("// indirect") {
        return;
    }
    let without_comment = line.split("//").next().unwrap_or(line).trim();
    if let Some(module) = without_comment.split_whitespace().next() {
        if seen.insert(module.to_string()) {
            result.push(module.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_uppercase_segments() {
        assert_eq!(
            escape_module_path("github.com/BurntSushi/toml"),
            "github.com/!burnt!sushi/toml"
        );
    }

    #[test]
    fn parses_block_requires_excluding_indirect() {
        let go_mod = r#"module example.com/foo

go 1.21

require (
	github.com/pkg/errors v0.9.1
	golang.org/x/sys v0.10.0 // indirect
)

require github.com/stretchr/testify v1.8.0
"#;
        let deps = parse_go_mod_requires(go_mod);
        assert_eq!(
            deps,
            vec![
                "github.com/pkg/errors".to_string(),
                "github.com/stretchr/testify".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_resolves_latest_and_go_mod() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/github.com/pkg/errors/@latest")
            .with_status(200)
            .with_body(r#"{"Version":"v0.9.1","Time":"2020-01-01T00:00:00Z"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/github.com/pkg/errors/@v/v0.9.1.mod")
            .with_status(200)
            .with_body("module github.com/pkg/errors\n\ngo 1.13\n")
            .create_async()
            .await;

        let fetcher = GoProxyFetcher::with_base_url(
            Arc::new(depgraph_cache::NullCache),
            Duration::from_secs(60),
            server.url(),
        );
        let token = CancellationToken::new();
        let pkg = fetcher.fetch(&token, "github.com/pkg/errors", false).await.unwrap();
        assert_eq!(pkg.version, "v0.9.1");
        assert!(pkg.dependencies.is_empty());
    }
}
