// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background auto-refresh loop, one per session.
//!
//! The loop sleeps until `expires_at - leeway`, refreshes, and starts over.
//! Failed attempts back off exponentially; once the retry budget is spent the
//! loop stops and fires [`SessionEvent::Exhausted`]. Both sleeps race the
//! session's cancellation token, so `stop` never waits out a timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RefreshConfig;
use crate::error::RefreshError;
use crate::refresher::TokenRefresher;
use crate::retry::RetryPolicy;
use crate::session::{Session, SessionEvent};

/// Lifecycle of a session's background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No loop has been started.
    Idle,
    Running,
    /// Stopped by the caller or given up after exhausting retries.
    Stopped,
}

/// Ownership of a running loop, stored on the session.
pub(crate) struct RefreshHandle {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Cancel the loop and wait for its task to finish.
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::warn!(loop_id = self.id, err = %e, "auto-refresh loop panicked");
            }
        }
    }
}

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

/// Starts and stops background refresh loops.
#[derive(Clone)]
pub struct AutoRefreshScheduler {
    refresher: TokenRefresher,
    policy: RetryPolicy,
    leeway: u64,
    error_backoff: Duration,
}

impl AutoRefreshScheduler {
    /// Build a scheduler from a validated `config`.
    pub fn new(refresher: TokenRefresher, config: &RefreshConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            refresher,
            policy: RetryPolicy::new(config.max_retries),
            leeway: config.leeway_secs,
            error_backoff: config.error_backoff(),
        })
    }

    /// Start (or restart) the background loop for `session`.
    ///
    /// A loop already running on the session is cancelled and awaited first,
    /// so two loops never run on one session.
    pub async fn start(&self, session: &Arc<Session>) {
        let mut slot = session.refresh_handle.lock().await;
        if let Some(old) = slot.take() {
            tracing::debug!(loop_id = old.id, "restarting auto-refresh loop");
            old.shutdown().await;
        }

        let id = NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        session.set_loop_leeway(Some(self.leeway));
        session.scheduler.send_replace(SchedulerState::Running);

        let refresh_loop = RefreshLoop {
            id,
            session: Arc::clone(session),
            refresher: self.refresher.clone(),
            policy: self.policy,
            leeway: self.leeway,
            error_backoff: self.error_backoff,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(refresh_loop.run());
        *slot = Some(RefreshHandle { id, cancel, task });
        tracing::info!(loop_id = id, "auto-refresh started");
    }

    /// Stop the background loop for `session`, if any. Idempotent.
    pub async fn stop(&self, session: &Session) {
        let mut slot = session.refresh_handle.lock().await;
        let Some(handle) = slot.take() else {
            return;
        };
        let id = handle.id;
        handle.shutdown().await;
        session.set_loop_leeway(None);
        session.scheduler.send_replace(SchedulerState::Stopped);
        tracing::info!(loop_id = id, "auto-refresh stopped");
    }
}

/// How one wait-then-refresh cycle ended.
enum Cycle {
    Refreshed,
    Cancelled,
    Exhausted { attempts: u32, error: RefreshError },
    Unexpected(RefreshError),
}

struct RefreshLoop {
    id: u64,
    session: Arc<Session>,
    refresher: TokenRefresher,
    policy: RetryPolicy,
    leeway: u64,
    error_backoff: Duration,
    cancel: CancellationToken,
}

impl RefreshLoop {
    async fn run(self) {
        tracing::debug!(loop_id = self.id, "auto-refresh loop running");
        loop {
            match self.cycle().await {
                Cycle::Refreshed => {}
                Cycle::Cancelled => {
                    tracing::debug!(loop_id = self.id, "auto-refresh loop cancelled");
                    return;
                }
                Cycle::Exhausted { attempts, error } => {
                    self.give_up(attempts, error);
                    return;
                }
                Cycle::Unexpected(e) => {
                    tracing::warn!(
                        loop_id = self.id,
                        err = %e,
                        "auto-refresh iteration failed, backing off"
                    );
                    if !self.sleep(self.error_backoff).await {
                        return;
                    }
                }
            }
        }
    }

    /// Wait until the refresh point, then refresh with retries.
    async fn cycle(&self) -> Cycle {
        let wait = self.until_refresh();
        if !wait.is_zero() {
            let wait_secs = wait.as_secs();
            tracing::debug!(loop_id = self.id, wait_secs, "sleeping until refresh");
            if !self.sleep(wait).await {
                return Cycle::Cancelled;
            }
        }

        let mut attempt: u32 = 1;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Cycle::Cancelled,
                r = self.refresher.refresh(&self.session) => r,
            };

            match result {
                Ok(tokens) => {
                    if tokens.is_expired_at(self.refresher.clock().now(), self.leeway) {
                        tracing::warn!(
                            loop_id = self.id,
                            expires_at = tokens.expires_at,
                            leeway = self.leeway,
                            "granted tokens already inside leeway, refreshing again"
                        );
                    }
                    return Cycle::Refreshed;
                }
                Err(RefreshError::Cancelled) => return Cycle::Cancelled,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(loop_id = self.id, attempt, err = %e, "refresh attempt failed");
                    self.session
                        .emit(SessionEvent::RefreshFailed { attempt, error: e.to_string() });
                    if !self.sleep(self.policy.backoff(attempt)).await {
                        return Cycle::Cancelled;
                    }
                    attempt += 1;
                    if self.policy.give_up(attempt) {
                        return Cycle::Exhausted { attempts: attempt - 1, error: e };
                    }
                }
                Err(e) => return Cycle::Unexpected(e),
            }
        }
    }

    fn until_refresh(&self) -> Duration {
        let refresh_at = self.session.expires_at().saturating_sub(self.leeway);
        let now = self.refresher.clock().now();
        Duration::from_secs(refresh_at.saturating_sub(now))
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn give_up(&self, attempts: u32, error: RefreshError) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::error!(
            loop_id = self.id,
            attempts,
            err = %error,
            "auto-refresh exhausted retries, session is logged out"
        );
        // A concurrent start/stop holding the slot is replacing this loop anyway.
        if let Ok(mut slot) = self.session.refresh_handle.try_lock() {
            if slot.as_ref().is_some_and(|h| h.id == self.id) {
                *slot = None;
            }
        }
        self.session.set_loop_leeway(None);
        self.session.scheduler.send_replace(SchedulerState::Stopped);
        self.session.emit(SessionEvent::Exhausted { attempts, error: error.to_string() });
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
