//! Shared HTTP adapter used by every registry fetcher: one GET primitive
//! with JSON/text decoding, header merging, cache-wrapped reads, and
//! retry/backoff around the network call itself.

mod client;
pub mod normalize;

pub use client::HttpAdapter;
