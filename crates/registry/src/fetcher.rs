use async_trait::async_trait;
use commons::DepgraphError;
use graph::Package;
use tokio_util::sync::CancellationToken;

/// One ecosystem's adapter: turns a canonical package name into a
/// [`Package`]. Implementations must be safe for concurrent use — the
/// crawler calls `fetch` from every worker in its pool.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Canonical registry id, e.g. `"pypi"`, `"crates.io"`.
    fn name(&self) -> &str;

    /// Resolve `name` to a [`Package`].
    ///
    /// Returns [`DepgraphError::NotFound`] (optionally wrapped with the
    /// package identity) when the primary registry call 404s. Best-effort
    /// secondary calls (a dependency endpoint, a manifest/POM fetch) may
    /// fail silently, leaving `dependencies` empty — that must never turn
    /// into an `Err` from this method.
    async fn fetch(
        &self,
        token: &CancellationToken,
        name: &str,
        refresh: bool,
    ) -> Result<Package, DepgraphError>;
}
