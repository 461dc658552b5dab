use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Retries `task` with a per-attempt timeout and exponential backoff.
///
/// `policy.max_retries == 0` keeps retrying forever; callers bound the whole
/// loop with their own deadline in that case. On exhaustion the last attempt's
/// error is returned.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    label: &str,
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P>>,
{
    let attempt_timeout = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let e = match timeout(attempt_timeout, task()).await {
            Ok(Ok(r)) => {
                debug!(%label, attempts, "task succeeded");
                return Ok(r);
            }
            Ok(Err(error)) => error,
            Err(_) => Error::Timeout {
                node: label.to_string(),
                operation: "attempt",
                duration: attempt_timeout,
            },
        };

        if policy.max_retries != 0 && attempts >= policy.max_retries {
            warn!(%label, attempts, "task failed after max retries: {}", e);
            return Err(e);
        }

        debug!(%label, attempts, ?delay, "attempt failed, backing off: {}", e);
        sleep(delay).await;
        delay = (delay * 2).min(max_delay);
    }
}
