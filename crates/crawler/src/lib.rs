//! The concurrent, bounded-depth, worker-pool crawler: turns a root package
//! name into a [`graph::Dag`] by repeatedly calling a [`registry::Fetcher`],
//! deduplicating by name, and materializing every declared edge exactly
//! once per parent regardless of how many times a name is reached.

mod crawler;
mod resolver;

pub use crawler::Crawler;
pub use resolver::Resolver;
