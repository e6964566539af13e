use std::sync::Arc;
use std::time::Duration;

use commons::DepgraphError;

use crate::Cache;

struct Namespaced {
    prefix: String,
    inner: Arc<dyn Cache>,
}

impl Namespaced {
    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

impl Cache for Namespaced {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DepgraphError> {
        self.inner.get(&self.scoped(key))
    }

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), DepgraphError> {
        self.inner.set(&self.scoped(key), bytes, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), DepgraphError> {
        self.inner.delete(&self.scoped(key))
    }

    fn close(&self) -> Result<(), DepgraphError> {
        self.inner.close()
    }
}

/// Wrap `inner` so every key is transparently prefixed with `prefix`.
///
/// Lets unrelated callers (different registries, different tenants) share
/// one on-disk directory without colliding on keys.
pub fn namespaced(inner: Arc<dyn Cache>, prefix: impl Into<String>) -> Arc<dyn Cache> {
    Arc::new(Namespaced {
        prefix: prefix.into(),
        inner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileCache;

    #[test]
    fn prefixes_keys_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let inner: Arc<dyn Cache> = Arc::new(FileCache::new(dir.path()));
        let scoped = namespaced(inner.clone(), "pypi");

        scoped.set("requests", b"1", Duration::from_secs(60)).unwrap();
        assert_eq!(scoped.get("requests").unwrap().unwrap(), b"1");
        assert_eq!(inner.get("pypi:requests").unwrap().unwrap(), b"1");
        assert_eq!(inner.get("requests").unwrap(), None);
    }

    #[test]
    fn distinct_prefixes_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let inner: Arc<dyn Cache> = Arc::new(FileCache::new(dir.path()));
        let a = namespaced(inner.clone(), "pypi");
        let b = namespaced(inner.clone(), "npm");

        a.set("lodash", b"py", Duration::from_secs(60)).unwrap();
        b.set("lodash", b"js", Duration::from_secs(60)).unwrap();
        assert_eq!(a.get("lodash").unwrap().unwrap(), b"py");
        assert_eq!(b.get("lodash").unwrap().unwrap(), b"js");
    }
}
