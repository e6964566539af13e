//! Top-level entry point: given a registry name or a manifest path, look up
//! the matching [`language::Language`] and drive its [`crawler::Resolver`]
//! or [`manifest::ManifestParser`] to completion.
//!
//! This crate is glue, not a new layer of policy — it owns cache-directory
//! defaulting and the ecosystem-name/filename dispatch, then delegates
//! straight into the crates that do the real work.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use commons::{DepgraphError, RateLimited, RetryableError};
pub use crawler::Resolver;
pub use depgraph_cache::{Cache, FileCache, NullCache};
pub use graph::{
    Dag, Edge, MetadataProvider, Node, NodeKind, Options, Package, PackageRef, PROJECT_ROOT_ID,
};
pub use language::{Language, LanguageRegistry};
pub use manifest::{ManifestParser, ManifestResult};
pub use registry::Fetcher;

/// Directory name used under the user's cache home when no explicit path is
/// given to [`open_cache`].
pub const DEFAULT_APP_NAME: &str = "depgraph";

/// Resolve the default cache directory, `~/.cache/<app_name>/` (or the
/// platform equivalent via [`dirs::cache_dir`]), falling back to the system
/// temp directory if the platform exposes no cache home.
pub fn default_cache_dir(app_name: &str) -> PathBuf {
    FileCache::default_dir(app_name)
}

/// Build a [`Cache`] backed by `dir`, or a [`NullCache`] if `dir` is `None`
/// (persistence disabled). Never touches the filesystem itself — `FileCache`
/// creates shard directories lazily on first write.
pub fn open_cache(dir: Option<PathBuf>) -> Arc<dyn Cache> {
    match dir {
        Some(dir) => Arc::new(FileCache::new(dir)),
        None => Arc::new(NullCache),
    }
}

/// Errors this facade can produce: dispatch failures of its own, plus
/// whatever the underlying [`Resolver`]/[`ManifestParser`] returned.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No [`Language`] matches the given registry name or alias.
    #[error("unknown ecosystem: {0}")]
    UnknownEcosystem(String),

    /// No [`Language`] recognizes the given manifest filename.
    #[error("unknown manifest file: {0}")]
    UnknownManifest(String),

    /// Dispatch succeeded; the crawl or parse itself failed.
    #[error(transparent)]
    Failed(#[from] commons::DepgraphError),
}

/// Crawl `root_name` in the named ecosystem (e.g. `"pypi"`, `"npm"`,
/// `"cargo"`), starting from `registry.by_name(ecosystem)`.
pub async fn resolve(
    registry: &LanguageRegistry,
    ecosystem: &str,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
    token: &CancellationToken,
    root_name: &str,
    options: Options,
) -> Result<Dag, DispatchError> {
    let language = registry
        .by_name(ecosystem)
        .ok_or_else(|| DispatchError::UnknownEcosystem(ecosystem.to_string()))?;
    let canonical = language.normalize(root_name);
    let resolver = language.resolver(cache, cache_ttl);
    Ok(resolver.resolve(token, &canonical, options).await?)
}

/// Parse a local manifest `path`, dispatching on its filename, optionally
/// expanding direct dependencies into their transitive closure via a
/// resolver built for the same ecosystem.
pub async fn parse_manifest(
    registry: &LanguageRegistry,
    path: &Path,
    expand: bool,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
    token: &CancellationToken,
    options: Options,
) -> Result<ManifestResult, DispatchError> {
    let filename = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default();
    let language = registry
        .by_manifest_filename(filename)
        .ok_or_else(|| DispatchError::UnknownManifest(filename.to_string()))?;

    let resolver = if expand {
        Some(language.resolver(cache, cache_ttl))
    } else {
        None
    };
    let parser = language
        .manifest(filename, resolver)
        .ok_or_else(|| DispatchError::UnknownManifest(filename.to_string()))?;

    Ok(parser.parse(path, token, options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_dir_is_scoped_by_app_name() {
        assert!(default_cache_dir("my-app").ends_with("my-app"));
    }

    #[tokio::test]
    async fn resolve_rejects_an_unknown_ecosystem() {
        let registry = LanguageRegistry::with_defaults();
        let cache: Arc<dyn Cache> = Arc::new(NullCache);
        let token = CancellationToken::new();
        let err = resolve(
            &registry,
            "cobol",
            cache,
            Duration::from_secs(60),
            &token,
            "root",
            Options::default().with_defaults(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownEcosystem(_)));
    }

    #[tokio::test]
    async fn parse_manifest_rejects_an_unrecognized_filename() {
        let registry = LanguageRegistry::with_defaults();
        let cache: Arc<dyn Cache> = Arc::new(NullCache);
        let token = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Weirdfile.xyz");
        std::fs::write(&path, "").unwrap();
        let err = parse_manifest(
            &registry,
            &path,
            false,
            cache,
            Duration::from_secs(60),
            &token,
            Options::default().with_defaults(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownManifest(_)));
    }
}
