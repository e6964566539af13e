use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `pyproject.toml`'s PEP 621 `[project.dependencies]` array, or a
/// `[tool.poetry.dependencies]` table (excluding the `python` pseudo-entry)
/// when the PEP 621 table is absent.
pub struct PyprojectManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl PyprojectManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        PyprojectManifest { resolver }
    }
}

fn base_name(requirement: &str) -> Option<String> {
    let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*").expect("valid regex");
    re.find(requirement.trim()).map(|m| m.as_str().to_string())
}

fn extract_deps(doc: &toml::Value) -> Vec<String> {
    if let Some(list) = doc
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        return list
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(base_name)
            .collect();
    }

    if let Some(table) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        return table
            .keys()
            .filter(|k| *k != "python")
            .cloned()
            .collect();
    }

    Vec::new()
}

#[async_trait]
impl ManifestParser for PyprojectManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "pyproject.toml"
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

        let version = doc
            .get("project")
            .and_then(|p| p.get("version"))
            .or_else(|| {
                doc.get("tool")
                    .and_then(|t| t.get("poetry"))
                    .and_then(|p| p.get("version"))
            })
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let deps = extract_deps(&doc);

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
