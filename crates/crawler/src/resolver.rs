use async_trait::async_trait;
use commons::DepgraphError;
use graph::{Dag, Options};
use tokio_util::sync::CancellationToken;

/// The downstream-facing capability a [`crate::Crawler`] (or any other
/// traversal strategy) offers: turn a root package name into a [`Dag`].
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Canonical registry id this resolver crawls, e.g. `"pypi"`.
    fn name(&self) -> &str;

    /// Resolve the transitive dependency graph rooted at `root_name`.
    ///
    /// `options` is used as given — callers are expected to have already
    /// called [`Options::with_defaults`] (a zero `max_depth` means "root
    /// only", not "use the default", so this method must not re-apply
    /// defaults on the caller's behalf).
    ///
    /// Fails only if the root package itself cannot be fetched, or if
    /// `token` is cancelled before the root result is collected; every
    /// other fetch failure is logged through `options.logger` and the
    /// graph is returned partial.
    async fn resolve(
        &self,
        token: &CancellationToken,
        root_name: &str,
        options: Options,
    ) -> Result<Dag, DepgraphError>;
}
