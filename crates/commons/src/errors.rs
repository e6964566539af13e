//! Error taxonomy shared by the HTTP adapter, registry fetchers and crawler.
//!
//! Consumers are expected to match on [`DepgraphError`] variants rather than
//! on formatted messages; only [`DepgraphError::Network`] and
//! [`DepgraphError::RateLimited`] carry retry semantics (see
//! [`RetryableError`] and `depgraph_retry::IsRetryable`).

use std::fmt;

/// A 429 response, optionally carrying the number of seconds the caller
/// was told to wait before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimited {
    /// Value of `Retry-After`, in seconds, if the upstream sent one.
    pub retry_after: Option<u64>,
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.retry_after {
            Some(secs) => write!(f, "rate limited, retry after {}s", secs),
            None => write!(f, "rate limited"),
        }
    }
}

impl std::error::Error for RateLimited {}

/// Marks an underlying error as safe to retry.
///
/// This is a thin wrapper, not a classifier: callers decide at the point an
/// error is produced (transport failure, 5xx) whether it qualifies, then
/// wrap it with [`RetryableError::new`]. `depgraph_retry::Retry` only acts
/// on errors it can find one of these in, via [`is_retryable`].
#[derive(Debug)]
pub struct RetryableError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl RetryableError {
    /// Tag `err` as retryable.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        RetryableError(Box::new(err))
    }
}

impl fmt::Display for RetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for RetryableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Distinct marker for "a retry loop gave up because its cancellation token
/// fired while sleeping between attempts" (spec: "If `ctx` cancels during a
/// sleep, returns the context's cancellation error"), kept separate from
/// whatever error the retried attempt itself last produced so a caller can
/// tell the two apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Walk `err`'s source chain looking for a [`RetryableError`] marker.
pub fn is_retryable(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cursor: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cursor {
        if e.downcast_ref::<RetryableError>().is_some() {
            return true;
        }
        if let Some(depgraph_err) = e.downcast_ref::<DepgraphError>() {
            return matches!(depgraph_err, DepgraphError::Network(_));
        }
        cursor = e.source();
    }
    false
}

/// The ecosystem-agnostic errors produced by the HTTP adapter and every
/// registry fetcher / manifest parser built on top of it.
#[derive(Debug, thiserror::Error)]
pub enum DepgraphError {
    /// Upstream responded 404. Never retryable; a root-package 404 fails a
    /// crawl outright, a non-root one is logged and skipped.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure or 5xx, wrapped as retryable.
    #[error("network error: {0}")]
    Network(#[source] RetryableError),

    /// Upstream responded 429. Surfaced to the caller; not retried
    /// automatically unless the caller chooses to honor `retry_after`.
    #[error("{0}")]
    RateLimited(RateLimited),

    /// Any other non-2xx status.
    #[error("http {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase, truncated.
        message: String,
    },

    /// Response body could not be decoded as the expected format.
    #[error("decode error: {0}")]
    Decode(String),

    /// Catch-all for errors that do not need their own variant (cache I/O,
    /// config validation, etc). Not retryable.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DepgraphError {
    /// True if this variant is the 404 kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DepgraphError::NotFound(_))
    }
}

impl From<Cancelled> for DepgraphError {
    fn from(_: Cancelled) -> Self {
        DepgraphError::Other(anyhow::anyhow!("cancelled"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn network_errors_are_retryable() {
        let err = DepgraphError::Network(RetryableError::new(Boom));
        assert!(is_retryable(&err));
    }

    #[test]
    fn not_found_is_not_retryable() {
        let err = DepgraphError::NotFound("pkg".into());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn rate_limited_is_not_retryable_by_default() {
        let err = DepgraphError::RateLimited(RateLimited {
            retry_after: Some(30),
        });
        assert!(!is_retryable(&err));
    }
}
