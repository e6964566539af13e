use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use commons::DepgraphError;
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

/// Sink for non-fatal diagnostics (a failed non-root fetch, a provider
/// error, a decode failure). Default discards everything.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

fn discard_logger() -> Logger {
    Arc::new(|_msg: &str| {})
}

/// Identifies the package an enrichment call is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub ecosystem: String,
    pub name: String,
    pub version: String,
}

/// Augments a node's metadata with data from a non-registry source after
/// the structural crawl (e.g. repository stars/contributors). Providers
/// must be safe for concurrent use; the crawler may call `enrich` for
/// many packages at once.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn enrich(
        &self,
        token: &CancellationToken,
        package: &PackageRef,
        refresh: bool,
    ) -> Result<IndexMap<String, String>, DepgraphError>;
}

/// Configuration threaded through one crawl. Immutable once built via
/// [`Options::with_defaults`].
#[derive(Clone)]
pub struct Options {
    /// Depth of root = 0; default 5.
    pub max_depth: u32,
    /// Soft ceiling on node creation; default 1000.
    pub max_nodes: u32,
    /// If true, cache reads are bypassed; writes still happen.
    pub refresh: bool,
    /// Duration before a cached HTTP response is considered stale.
    pub cache_ttl: Duration,
    pub logger: Logger,
    /// Ordered enrichers; later providers overwrite earlier keys on
    /// conflicting metadata.
    pub metadata_providers: Vec<Arc<dyn MetadataProvider>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_depth: 0,
            max_nodes: 0,
            refresh: false,
            cache_ttl: Duration::ZERO,
            logger: discard_logger(),
            metadata_providers: Vec::new(),
        }
    }
}

impl Options {
    pub const DEFAULT_MAX_DEPTH: u32 = 5;
    pub const DEFAULT_MAX_NODES: u32 = 1000;
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Replace any zero field with its default and install a discarding
    /// logger if none was set. Call once before starting a crawl; the
    /// result should then be treated as immutable.
    pub fn with_defaults(mut self) -> Self {
        if self.max_depth == 0 {
            self.max_depth = Self::DEFAULT_MAX_DEPTH;
        }
        if self.max_nodes == 0 {
            self.max_nodes = Self::DEFAULT_MAX_NODES;
        }
        if self.cache_ttl.is_zero() {
            self.cache_ttl = Self::DEFAULT_CACHE_TTL;
        }
        self
    }

    pub fn log(&self, message: impl AsRef<str>) {
        (self.logger)(message.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_defaults_fills_in_zero_fields() {
        let opts = Options::default().with_defaults();
        assert_eq!(opts.max_depth, Options::DEFAULT_MAX_DEPTH);
        assert_eq!(opts.max_nodes, Options::DEFAULT_MAX_NODES);
        assert_eq!(opts.cache_ttl, Options::DEFAULT_CACHE_TTL);
    }

    #[test]
    fn with_defaults_preserves_explicit_values() {
        let opts = Options {
            max_depth: 2,
            max_nodes: 10,
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(opts.max_depth, 2);
        assert_eq!(opts.max_nodes, 10);
    }
}
