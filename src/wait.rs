use std::future::Future;
use std::time::Duration;

/// Resolves with `future`'s output, but never sooner than `min` after the call.
///
/// The timer and the future run concurrently, so a slow future is not delayed
/// any further. Values and errors pass through untouched.
pub async fn wait_at_least<F>(min: Duration, future: F) -> F::Output
where
    F: Future,
{
    let (output, ()) = tokio::join!(future, tokio::time::sleep(min));
    output
}
