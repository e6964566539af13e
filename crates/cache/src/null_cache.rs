use std::time::Duration;

use commons::DepgraphError;

use crate::Cache;

/// A [`Cache`] that always misses and silently discards writes.
///
/// Used by callers that want the crawler's caching code paths exercised
/// (same `Cached` wrapper, same retry/backoff) without persisting anything
/// to disk, e.g. one-shot invocations or tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, DepgraphError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _bytes: &[u8], _ttl: Duration) -> Result<(), DepgraphError> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> Result<(), DepgraphError> {
        Ok(())
    }

    fn close(&self) -> Result<(), DepgraphError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_misses() {
        let cache = NullCache;
        cache.set("k", b"v", Duration::ZERO).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }
}
