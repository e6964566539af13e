use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `Cargo.toml`'s `[dependencies]` and `[dev-dependencies]` tables
/// into direct dependencies.
pub struct CargoTomlManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl CargoTomlManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        CargoTomlManifest { resolver }
    }
}

fn table_keys(doc: &toml::Value, section: &str) -> Vec<String> {
    doc.get(section)
        .and_then(|v| v.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl ManifestParser for CargoTomlManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "Cargo.toml"
    }

    fn manifest_type(&self) -> &str {
        "cargo"
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
        let doc: toml::Value = text
            .parse()
            .map_err(|e| DepgraphError::Decode(format!("{:?}: {}", path, e)))?;

        let version = doc
            .get("package")
            .and_then(|p| p.get("version"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let mut seen = std::collections::HashSet::new();
        let mut deps = Vec::new();
        for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
            for dep in table_keys(&doc, section) {
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
    async fn shallow_parse_collects_all_dependency_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cargo.toml");
        std::fs::write(
            &path,
            r#"
[package]
name = "demo"
version = "0.3.0"

[dependencies]
serde = "1"

[dev-dependencies]
tempfile = "3"
"#,
        )
        .unwrap();

        let manifest = CargoTomlManifest::new(None);
        let token = CancellationToken::new();
        let result = manifest
            .parse(&path, &token, Options::default())
            .await
            .unwrap();

        assert!(result.dag.contains_edge("__project__", "serde"));
        assert!(result.dag.contains_edge("__project__", "tempfile"));
        assert_eq!(
            result.dag.node("__project__").unwrap().meta.get("version").unwrap(),
            "0.3.0"
        );
    }
}
