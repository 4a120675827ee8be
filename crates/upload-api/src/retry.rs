//! Bounded retry with exponential backoff for part PUTs.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clipvault_protocol::constants::DEFAULT_MAX_RETRIES;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{Error, PartUploadError};
use crate::transport::PartStorage;

/// Retry budget for a single part.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total PUT attempts, including the first.
    pub max_attempts: u32,
    /// Backoff unit: the delay after attempt `n` is `unit * 2^n`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based): 2s, 4s, 8s…
    /// with the default unit.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(1u32 << attempt.min(20))
    }
}

/// Uploads one part's bytes to its presigned URL, retrying with backoff.
///
/// The same URL is reused for every attempt; credentials are not
/// re-requested at this layer.
pub struct PartUploader {
    storage: Arc<dyn PartStorage>,
    policy: RetryPolicy,
}

impl PartUploader {
    pub fn new(storage: Arc<dyn PartStorage>, policy: RetryPolicy) -> Self {
        let policy = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        Self { storage, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// PUTs `data` to `url` and returns the ETag.
    ///
    /// `on_progress` receives the in-flight attempt's progress scaled to
    /// 0–100. Transport errors, non-2xx responses and a missing ETag each
    /// consume one attempt. Cancellation is honoured during the PUT and
    /// during backoff sleeps.
    pub async fn put(
        &self,
        part_number: u32,
        url: &str,
        data: Bytes,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let total = data.len() as u64;
        let on_sent = |sent: u64| {
            let pct = if total == 0 {
                100.0
            } else {
                sent as f64 / total as f64 * 100.0
            };
            on_progress(pct);
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                r = self.storage.put_part(url, data.clone(), &on_sent) => r,
            };

            let err = match result {
                Ok(etag) => {
                    debug!(part = part_number, attempt, %etag, "part uploaded");
                    return Ok(etag);
                }
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                error!(part = part_number, attempts = attempt, error = %err, "part upload failed");
                return Err(PartUploadError {
                    part_number,
                    attempts: attempt,
                    last_error: err,
                }
                .into());
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                part = part_number,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %err,
                retry_in_secs = delay.as_secs_f64(),
                "part upload attempt failed"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
