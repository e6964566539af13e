//! Test helpers shared across the depgraph crates.

/// Initialize logging for a test binary, once, from `RUST_LOG`.
///
/// Safe to call from every test: repeated calls after the first are no-ops.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}
