use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What a [`Fetcher`](crate::Fetcher) (or a manifest's virtual root)
/// returns: one resolved package plus the direct dependency names the
/// crawler should visit next.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    /// Canonical name in its ecosystem; this becomes the DAG node id.
    pub name: String,
    /// The "current" version the fetcher chose (latest stable / max
    /// version / latest dist-tag / `@latest`, depending on ecosystem).
    pub version: String,
    /// Direct children to crawl, in declaration order. Order doesn't
    /// affect correctness but is preserved for deterministic traversal.
    pub dependencies: Vec<String>,
    /// Short description, if the registry provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SPDX identifier or free-form license string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Author / maintainer, if the registry exposes one field for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Source repository URL, normalized via
    /// [`http_adapter::normalize::normalize_repo_url`] by the fetcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Project homepage URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Label of the manifest file type this package was resolved from,
    /// when it originated from a manifest rather than a registry
    /// (e.g. `"Cargo.toml"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_file: Option<String>,
    /// Download count, if the registry exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
}

impl Package {
    /// A minimal package with only a name, version and dependency list
    /// set; useful for fetchers and tests building up a `Package`
    /// incrementally.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Derive the display metadata mapping: `version` is always present;
    /// every other field is included only when non-empty/non-zero.
    pub fn metadata(&self) -> IndexMap<String, String> {
        let mut meta = IndexMap::new();
        meta.insert("version".to_string(), self.version.clone());
        if let Some(v) = &self.description {
            if !v.is_empty() {
                meta.insert("description".to_string(), v.clone());
            }
        }
        if let Some(v) = &self.license {
            if !v.is_empty() {
                meta.insert("license".to_string(), v.clone());
            }
        }
        if let Some(v) = &self.author {
            if !v.is_empty() {
                meta.insert("author".to_string(), v.clone());
            }
        }
        if let Some(v) = &self.repository {
            if !v.is_empty() {
                meta.insert("repository".to_string(), v.clone());
            }
        }
        if let Some(v) = &self.homepage {
            if !v.is_empty() {
                meta.insert("homepage".to_string(), v.clone());
            }
        }
        if let Some(v) = &self.manifest_file {
            if !v.is_empty() {
                meta.insert("manifest_file".to_string(), v.clone());
            }
        }
        if let Some(v) = self.downloads {
            if v != 0 {
                meta.insert("downloads".to_string(), v.to_string());
            }
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_contains_only_version_when_optional_fields_are_empty() {
        let pkg = Package::new("requests", "2.31.0");
        let meta = pkg.metadata();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("version").unwrap(), "2.31.0");
    }

    #[test]
    fn metadata_includes_non_empty_optional_fields() {
        let mut pkg = Package::new("requests", "2.31.0");
        pkg.license = Some("Apache-2.0".to_string());
        pkg.downloads = Some(0);
        pkg.description = Some(String::new());
        let meta = pkg.metadata();
        assert_eq!(meta.get("license").unwrap(), "Apache-2.0");
        assert!(!meta.contains_key("downloads"));
        assert!(!meta.contains_key("description"));
    }
}
