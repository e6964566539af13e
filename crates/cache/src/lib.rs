//! Keyed blob cache used to persist HTTP responses (and, by higher layers,
//! graph/layout/artifact results) across process runs.
//!
//! [`Cache`] is the capability every layer programs against; [`FileCache`]
//! is the on-disk implementation (one JSON file per entry, sharded two
//! levels deep by the SHA-256 of the key, mirroring the release/registry
//! caches the crawler keeps in memory but made durable). [`NullCache`]
//! satisfies the same contract while discarding everything, for callers
//! that disable persistence. [`namespaced`] wraps any `Cache` with a key
//! prefix so unrelated callers sharing one directory cannot collide.

mod file_cache;
mod keyer;
mod namespace;
mod null_cache;

pub use file_cache::FileCache;
pub use keyer::{artifact_key, graph_key, http_key, layout_key};
pub use namespace::namespaced;
pub use null_cache::NullCache;

use std::time::Duration;

use commons::DepgraphError;

/// A keyed, TTL-bearing blob store.
///
/// `ttl = Duration::ZERO` passed to [`Cache::set`] means "never expire".
/// Implementations must be safe for concurrent use: in-process callers may
/// invoke `get`/`set` concurrently without external locking, and multiple
/// processes may share a directory-backed implementation (the last writer
/// wins).
pub trait Cache: Send + Sync {
    /// Read `key`. Returns `Ok(None)` on a miss, on an expired entry
    /// (which is transparently removed), or on a corrupt entry (also
    /// removed and treated as a miss). Unexpected I/O errors propagate.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DepgraphError>;

    /// Store `bytes` under `key` with the given time-to-live.
    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), DepgraphError>;

    /// Remove `key`, if present. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), DepgraphError>;

    /// Release any held resources. Idempotent.
    fn close(&self) -> Result<(), DepgraphError>;
}
