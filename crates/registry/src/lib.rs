//! Per-ecosystem [`Fetcher`] implementations.
//!
//! Every fetcher follows the same shape: canonicalize the name, run the
//! primary registry call through [`http_adapter::HttpAdapter::cached`],
//! populate a [`graph::Package`], and let best-effort secondary calls
//! (a dependency endpoint, a `.mod`/POM fetch) fail silently rather than
//! failing the whole `Fetch`.

mod fetcher;
mod fetchers;

pub use fetcher::Fetcher;
pub use fetchers::{
    CratesIoFetcher, GoProxyFetcher, MavenFetcher, NpmFetcher, PackagistFetcher, PypiFetcher,
    RubyGemsFetcher,
};
