//! Polling for long running vSphere operations which have no completion notification.

use std::{future::Future, time::Duration};

use tokio::time::Instant;

use crate::error::ProvisionError;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// The result of a single check while waiting.
pub enum Progress {
    Done,
    /// Still in progress, with a status to show the operator
    Pending(String),
}

/// Calls `check` every `interval` until it reports [`Progress::Done`] or `timeout` elapses.
///
/// An error from `check` aborts the wait, so checks should return errors only for states that
/// will not recover on their own.
pub async fn poll_until<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Progress>>,
{
    // No deadline when it lies beyond what `Instant` can represent
    let deadline = Instant::now().checked_add(timeout);

    loop {
        match check().await? {
            Progress::Done => return Ok(()),
            Progress::Pending(status) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return Err(ProvisionError::Timeout {
                        what: what.to_string(),
                        timeout,
                    }
                    .into());
                }

                println!("Waiting for {what}: {status}");
                tokio::time::sleep(interval).await;
            }
        }
    }
}
