use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `composer.json`'s `require` and `require-dev` blocks into direct
/// dependencies.
pub struct ComposerManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl ComposerManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        ComposerManifest { resolver }
    }
}

/// Composer requires include the PHP runtime itself and extension/library
/// pseudo-packages, neither of which names an installable dependency; real
/// package names are always `vendor/name`.
fn is_real_dependency(key: &str) -> bool {
    if key == "php" || key == "composer-plugin-api" || key == "composer-runtime-api" {
        return false;
    }
    if key.starts_with("ext-") || key.starts_with("lib-") {
        return false;
    }
    key.contains('/')
}

fn require_keys(value: &serde_json::Value, section: &str) -> Vec<String> {
    value
        .get(section)
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.keys()
                .filter(|k| is_real_dependency(k))
                .cloned()
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ManifestParser for ComposerManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "composer.json"
    }

    fn manifest_type(&self) -> &str {
        "composer"
    }

    fn includes_transitive(&self) -> bool {
        self.resolver.is_some()
    }

    async fn parse(
        &self,
        path: &Path,
        token: &CancellationToken,
        options: Options,
    ) -> Result<ManifestResult, DepgraphError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DepgraphError::Other(anyhow::anyhow!("reading {:?}: {}", path, e)))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| DepgraphError::Decode(format!("{:?}: {}", path, e)))?;

        let version = value
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let mut seen = std::collections::HashSet::new();
        let mut deps = Vec::new();
        for section in ["require", "require-dev"] {
            for dep in require_keys(&value, section) {
                if seen.insert(dep.clone()) {
                    deps.push(dep);
                }
            }
        }

        Ok(build_manifest_dag(
            &self.resolver,
            token,
            &options,
            self.manifest_type(),
            &version,
            deps,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shallow_parse_excludes_runtime_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composer.json");
        std::fs::write(
            &path,
            r#"{"name":"me/app","version":"1.0.0","require":{"php":"^8.1","ext-json":"*","vendor/pkg":"^1.0"}}"#,
        )
        .unwrap();

        let manifest = ComposerManifest::new(None);
        let token = CancellationToken::new();
        let result = manifest
            .parse(&path, &token, Options::default())
            .await
            .unwrap();

        assert_eq!(result.dag.node_count(), 2);
        assert!(result.dag.contains_edge("__project__", "vendor/pkg"));
        assert!(!result.dag.contains_node("php"));
        assert!(!result.dag.contains_node("ext-json"));
        assert_eq!(
            result.dag.node("__project__").unwrap().meta.get("version").unwrap(),
            "1.0.0"
        );
        assert!(!result.includes_transitive);
    }

    #[tokio::test]
    async fn shallow_parse_collects_require_dev() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composer.json");
        std::fs::write(
            &path,
            r#"{"name":"me/app","version":"1.0.0","require":{"vendor/pkg":"^1.0"},"require-dev":{"vendor/test-pkg":"^2.0"}}"#,
        )
        .unwrap();

        let manifest = ComposerManifest::new(None);
        let token = CancellationToken::new();
        let result = manifest
            .parse(&path, &token, Options::default())
            .await
            .unwrap();

        assert!(result.dag.contains_edge("__project__", "vendor/pkg"));
        assert!(result.dag.contains_edge("__project__", "vendor/test-pkg"));
    }
}
