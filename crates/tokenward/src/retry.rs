// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff for background refresh retries.

use std::time::Duration;

use crate::config::DEFAULT_MAX_RETRIES;

/// Plain exponential policy: no jitter, no cap. `max_retries` bounds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Wait before the next attempt: `2^attempt` seconds, attempt starting at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs)
    }

    /// True once `attempt` is past the retry budget.
    pub fn give_up(&self, attempt: u32) -> bool {
        attempt > self.max_retries
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
