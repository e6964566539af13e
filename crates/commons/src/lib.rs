//! Common error kinds and test helpers shared across the depgraph crates.

#![deny(missing_docs)]

mod errors;
pub mod testing;

pub use crate::errors::{Cancelled, DepgraphError, RateLimited, RetryableError};
