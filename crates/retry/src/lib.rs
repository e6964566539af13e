//! Exponential backoff around a single unit of work.
//!
//! [`retry`] is an outer decorator, not something baked into the HTTP
//! layer: a call site opts in by wrapping its fetch closure, which keeps
//! "retried vs. not" an explicit, reviewable property of that call site
//! rather than an implicit behavior of every network call.

use std::future::Future;
use std::time::Duration;

use commons::{is_retryable, Cancelled};
use tokio_util::sync::CancellationToken;

/// Default attempts/delay used by [`retry_with_backoff`].
const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Run `f` at most `max(1, attempts)` times.
///
/// After each failed attempt whose error is retryable (per
/// [`commons::is_retryable`]), sleeps `delay` and doubles `delay` for the
/// next iteration. A non-retryable error returns immediately. If `token`
/// is cancelled while sleeping, returns [`Cancelled`] (converted via `E`'s
/// `From<Cancelled>` impl) rather than the error from the attempt that was
/// about to be retried, so a caller can tell "gave up because cancelled"
/// apart from "the retried error itself."
pub async fn retry<T, E, F, Fut>(
    token: &CancellationToken,
    attempts: u32,
    initial_delay: Duration,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + From<Cancelled> + 'static,
{
    let attempts = attempts.max(1);
    let mut delay = initial_delay;

    for attempt in 0..attempts {
        if token.is_cancelled() {
            // The caller's own fetch is expected to observe cancellation
            // and return promptly; we just stop retrying around it.
            return f().await;
        }

        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let last_attempt = attempt + 1 == attempts;
                if last_attempt || !is_retryable(&err) {
                    return Err(err);
                }
                log::debug!(
                    "retrying after error (attempt {}/{}): {}",
                    attempt + 1,
                    attempts,
                    err
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return Err(E::from(Cancelled)),
                }
                delay *= 2;
            }
        }
    }

    unreachable!("loop always returns before exhausting attempts")
}

/// `retry(token, 3, 1s, f)`.
pub async fn retry_with_backoff<T, E, F, Fut>(token: &CancellationToken, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + From<Cancelled> + 'static,
{
    retry(token, DEFAULT_ATTEMPTS, DEFAULT_INITIAL_DELAY, f).await
}
