//! Per-chunk retry policy
//!
//! Chunk retries are off by default: the first failure is terminal
//! unless a policy is configured. When enabled, the policy retries with
//! exponential backoff and only for errors that can plausibly heal:
//! transport failures and 5xx rejections.

use std::time::Duration;

use crate::error::UploadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. Zero disables retry.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No retries: the first chunk failure fails the upload.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Retry up to `max_retries` times, backing off from 500ms and
    /// capping at 30s.
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Backoff before retry number `retry` (1-based): doubles each time,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.initial_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Whether a chunk error is worth another attempt.
pub fn is_retryable(err: &UploadError) -> bool {
    match err {
        UploadError::Request(e) => !e.is_builder(),
        UploadError::ChunkRejected { status, .. } => *status >= 500,
        _ => false,
    }
}
