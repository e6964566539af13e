//! Pure functions that build stable cache keys from structured inputs.
//!
//! Every kind hashes its JSON-encoded parts with SHA-256 (full 64 hex
//! chars) except [`http_key`], whose inputs (a namespace and an
//! already-normalized name) are readable enough on their own that hashing
//! would only hurt debuggability; the storage layer hashes it anyway when
//! picking a shard.

use serde::Serialize;
use sha2::{Digest, Sha256};

fn hash_json<T: Serialize>(parts: &T) -> String {
    let encoded = serde_json::to_vec(parts).expect("key parts are always serializable");
    let digest = Sha256::digest(&encoded);
    hex::encode(digest)
}

/// Key for a cached HTTP response: `http:<namespace>:<key>`.
///
/// This is the only key kind the crawler and HTTP adapter use directly.
pub fn http_key(namespace: &str, key: &str) -> String {
    format!("http:{}:{}", namespace, key)
}

/// Key for a cached crawl result, keyed by ecosystem, root package and the
/// crawl options that affect its shape (depth/node caps).
///
/// Used by outer layers (not the crawler itself); kept here so a single
/// [`namespaced`](super::namespaced) wrapper can cover all key kinds for a
/// multi-tenant deployment.
pub fn graph_key(language: &str, package: &str, depth: u32, max_nodes: u32) -> String {
    format!(
        "graph:{}",
        hash_json(&(language, package, depth, max_nodes))
    )
}

/// Key for a cached layout result (outer layer, not used by the core).
pub fn layout_key(graph_key: &str, layout_kind: &str) -> String {
    format!("layout:{}", hash_json(&(graph_key, layout_kind)))
}

/// Key for a cached rendered artifact (outer layer, not used by the core).
pub fn artifact_key(layout_key: &str, format: &str) -> String {
    format!("artifact:{}", hash_json(&(layout_key, format)))
}
