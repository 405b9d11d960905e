//! Fixed-delay retry shared by search-page and detail crawls.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Attempt budget and the fixed pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Run `op` until it succeeds, waiting `policy.delay` after each failure.
///
/// The first success wins; once the budget is exhausted the last error is
/// returned. Cancellation short-circuits both the pre-attempt check and the
/// inter-attempt sleep.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
    T: Send,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=policy.attempts {
        if cancel.is_cancelled() {
            return Err(anyhow!("cancelled while {what}"));
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, what, error = %err, "attempt failed");
                last_error = Some(err);
            }
        }

        if attempt < policy.attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(anyhow!("cancelled while {what}")),
                _ = tokio::time::sleep(policy.delay) => {}
            }
        }
    }

    Err(match last_error {
        Some(err) => err.context(format!("{what} failed after {} attempts", policy.attempts)),
        None => anyhow!("{what} was given no attempt budget"),
    })
}
