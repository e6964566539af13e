use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `Pipfile`'s `[packages]` table (TOML syntax) into direct
/// dependencies; `[dev-packages]` is excluded.
pub struct PipfileManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl PipfileManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        PipfileManifest { resolver }
    }
}

#[async_trait]
impl ManifestParser for PipfileManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "Pipfile"
    }

    fn manifest_type(&self) -> &str {
        "pypi"
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

        let deps = doc
            .get("packages")
            .and_then(|v| v.as_table())
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();

        Ok(build_manifest_dag(
            &self.resolver,
            token,
            &options,
            self.manifest_type(),
            "",
            deps,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shallow_parse_excludes_dev_packages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pipfile");
        std::fs::write(
            &path,
            "[packages]\nrequests = \"*\"\n\n[dev-packages]\npytest = \"*\"\n",
        )
        .unwrap();

        let manifest = PipfileManifest::new(None);
        let token = CancellationToken::new();
        let result = manifest
            .parse(&path, &token, Options::default())
            .await
            .unwrap();

        assert!(result.dag.contains_edge("__project__", "requests"));
        assert!(!result.dag.contains_node("pytest"));
    }
}
