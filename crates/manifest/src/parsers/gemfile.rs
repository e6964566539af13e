use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::Options;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::parser::{build_manifest_dag, ManifestParser, ManifestResult};

/// Reads a `Gemfile`'s `gem '<name>'` declarations into direct dependencies.
pub struct GemfileManifest {
    resolver: Option<Arc<dyn Resolver>>,
}

impl GemfileManifest {
    pub fn new(resolver: Option<Arc<dyn Resolver>>) -> Self {
        GemfileManifest { resolver }
    }
}

fn parse_gems(text: &str) -> Vec<String> {
    let re = Regex::new(r#"^\s*gem\s+['"]([^'"]+)['"]"#).expect("valid regex");
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for line in text.lines() {
        if let Some(caps) = re.captures(line) {
            let name = caps[1].to_string();
            if seen.insert(name.clone()) {
                result.push(name);
            }
        }
    }
    result
}

#[async_trait]
impl ManifestParser for GemfileManifest {
    fn supports(&self, filename: &str) -> bool {
        filename == "Gemfile"
    }

    fn manifest_type(&self) -> &str {
        "rubygems"
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
        let deps = parse_gems(&text);

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

    #[test]
    fn extracts_gem_names_ignoring_version_constraints() {
        let text = "source 'https://rubygems.org'\n\ngem 'rails', '~> 7.0'\ngem \"sidekiq\"\n# gem 'commented'\n";
        assert_eq!(parse_gems(text), vec!["rails".to_string(), "sidekiq".to_string()]);
    }
}
