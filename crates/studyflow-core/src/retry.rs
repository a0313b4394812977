//! Retry and deadline combinators for async operations.
//!
//! The pipeline composes them as
//! `with_retry(|| with_timeout(op(), budget), delays)` so that every attempt
//! gets a fresh timeout window.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Fraction of each retry delay applied as random jitter in either direction.
const JITTER: f64 = 0.2;

/// Distinguished error produced when [`with_timeout`] loses the race.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timeout")]
pub struct TimedOut(pub Duration);

/// Run `op` up to `delays.len() + 1` times, sleeping `delays[i] ± 20%`
/// before retry `i + 1`. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(op: F, delays: &[Duration]) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_if(op, delays, |_| true).await
}

/// Like [`with_retry`], but stops early when `should_retry` rejects an error.
///
/// Used by the pipeline so a cancelled attempt is not retried.
pub async fn with_retry_if<T, E, F, Fut, P>(
    mut op: F,
    delays: &[Duration],
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(delay) = delays.get(attempt) else {
                    return Err(err);
                };
                if !should_retry(&err) {
                    return Err(err);
                }
                attempt += 1;
                let wait = jittered(*delay);
                tracing::debug!(attempt, wait_ms = wait.as_millis() as u64, "Retrying");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Race `fut` against a timer of `limit`.
///
/// On timeout the wrapped future is dropped and `E::from(TimedOut)` is
/// returned. Work the future already handed off (spawned tasks, blocking
/// threads, a request on the wire) keeps running; pair this with a
/// cancellation token when that work must stop.
pub async fn with_timeout<T, E, Fut>(fut: Fut, limit: Duration) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<TimedOut>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(E::from(TimedOut(limit))),
    }
}

/// Apply ±20% random jitter to a delay.
pub fn jittered(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor = rand::rng().random_range((1.0 - JITTER)..=(1.0 + JITTER));
    delay.mul_f64(factor)
}

/// Convert a list of millisecond delays from settings.
pub fn delays_from_millis(millis: &[u64]) -> Vec<Duration> {
    millis.iter().copied().map(Duration::from_millis).collect()
}
