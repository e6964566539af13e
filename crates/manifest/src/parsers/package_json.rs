use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `package.json`'s `dependencies` object into direct dependencies.
/// `devDependencies`, `peerDependencies` and `optionalDependencies` are
/// excluded, mirroring the npm fetcher's own transitive-dependency filter.
pub struct PackageJsonManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl PackageJsonManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        PackageJsonManifest { resolver }
    }
}

#[async_trait]
impl ManifestParser for PackageJsonManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "package.json"
    }

    fn manifest_type(&self) -> &str {
        "npm"
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

        let deps = value
            .get("dependencies")
            .and_then(|v| v.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();

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
