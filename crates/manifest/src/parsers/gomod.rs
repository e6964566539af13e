use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `go.mod`'s `require` lines/blocks into direct dependencies.
pub struct GoModManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl GoModManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        GoModManifest { resolver }
    }
}

fn parse_module_name(text: &str) -> String {
    text.lines()
        .find_map(|line| line.trim().strip_prefix("module "))
        .map(str::trim)
        .unwrap_or("")
        .to_string()
}

fn parse_requires(text: &str) -> Vec<String> {
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
    if line.ends_with("// indirect") {
        return;
    }
    let without_comment = line.split("//").next().unwrap_or(line).trim();
    if let Some(module) = without_comment.split_whitespace().next() {
        if seen.insert(module.to_string()) {
            result.push(module.to_string());
        }
    }
}

#[async_trait]
impl ManifestParser for GoModManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "go.mod"
    }

    fn manifest_type(&self) -> &str {
        "go"
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

        let module = parse_module_name(&text);
        let deps = parse_requires(&text);

        // go.mod has no version field of its own; the module path is the
        // closest thing to project identity, so it is carried in `version`
        // rather than left blank.
        Ok(build_manifest_dag(
            &self.resolver,
            token,
            &options,
            self.manifest_type(),
            &module,
            deps,
        )
        .await)
    }
}
