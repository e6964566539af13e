use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `requirements.txt`, one base package name per non-comment,
/// non-option, non-`-r`-include line.
pub struct RequirementsTxtManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl RequirementsTxtManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        RequirementsTxtManifest { resolver }
    }
}

fn parse_requirements(text: &str) -> Vec<String> {
    let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*").expect("valid regex");
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        // Strip environment markers (`; python_version < "3.8"`).
        let without_marker = line.split(';').next().unwrap_or(line).trim();
        if let Some(m) = re.find(without_marker) {
            let name = m.as_str().to_string();
            if seen.insert(name.clone()) {
                result.push(name);
            }
        }
    }

    result
}

#[async_trait]
impl ManifestParser for RequirementsTxtManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "requirements.txt"
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
        let deps = parse_requirements(&text);

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
