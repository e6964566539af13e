use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a Maven `pom.xml`'s own `<dependencies>` block (not
/// `<dependencyManagement>`) into direct dependencies, applying the same
/// scope/optional/unresolved-property filter as the Maven Central fetcher.
pub struct PomXmlManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl PomXmlManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        PomXmlManifest { resolver }
    }
}

fn parse_pom(xml: &str) -> (String, Vec<String>) {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(_) => return (String::new(), Vec::new()),
    };
    let root = doc.root_element();
    let version = root
        .children()
        .find(|n| n.has_tag_name("version"))
        .and_then(|n| n.text())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let mut seen = HashSet::new();
    let mut deps = Vec::new();

    for deps_node in doc.descendants().filter(|n| n.has_tag_name("dependencies")) {
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
                deps.push(coordinate);
            }
        }
    }

    (version, deps)
}

#[async_trait]
impl ManifestParser for PomXmlManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "pom.xml"
    }

    fn manifest_type(&self) -> &str {
        "maven"
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
        let (version, deps) = parse_pom(&text);

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
