// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Seconds before real expiry at which a token counts as expired.
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

/// Failed background attempts tolerated before the session is given up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Pause after an unexpected loop error before the next iteration.
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 10;

/// Refresh timing configuration.
///
/// Embeddable in a binary's CLI via `#[command(flatten)]`.
#[derive(Debug, Clone, PartialEq, Eq, clap::Args)]
pub struct RefreshConfig {
    /// Safety margin in seconds subtracted from token expiry.
    #[arg(long, default_value_t = DEFAULT_LEEWAY_SECS, env = "TOKENWARD_LEEWAY_SECS")]
    pub leeway_secs: u64,

    /// Max consecutive refresh failures before the background loop gives up.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, env = "TOKENWARD_MAX_RETRIES")]
    pub max_retries: u32,

    /// Fixed pause in seconds after an unexpected background loop error.
    #[arg(long, default_value_t = DEFAULT_ERROR_BACKOFF_SECS, env = "TOKENWARD_ERROR_BACKOFF_SECS")]
    pub error_backoff_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            leeway_secs: DEFAULT_LEEWAY_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
        }
    }
}

impl RefreshConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.error_backoff_secs == 0 {
            anyhow::bail!("--error-backoff-secs must be greater than zero");
        }
        Ok(())
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
