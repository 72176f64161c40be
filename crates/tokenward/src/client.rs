// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-facing entry point tying the refresher and scheduler together.

use std::sync::Arc;

use crate::backend::AuthBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::RefreshConfig;
use crate::error::RefreshError;
use crate::refresher::TokenRefresher;
use crate::scheduler::AutoRefreshScheduler;
use crate::session::{Session, SessionEvent, SessionTokens, TokenGrant};

/// Auth session manager for one backend.
pub struct AuthClient {
    config: RefreshConfig,
    refresher: TokenRefresher,
    scheduler: AutoRefreshScheduler,
}

impl AuthClient {
    /// Build a client on the system clock. Fails if `config` is invalid.
    pub fn new(backend: Arc<dyn AuthBackend>, config: RefreshConfig) -> anyhow::Result<Self> {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn AuthBackend>,
        config: RefreshConfig,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let refresher = TokenRefresher::new(backend, clock);
        let scheduler = AutoRefreshScheduler::new(refresher.clone(), &config)?;
        Ok(Self { config, refresher, scheduler })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Establish a session from a login grant received just now.
    pub fn establish(&self, grant: TokenGrant) -> Arc<Session> {
        Arc::new(Session::from_grant(grant, self.refresher.clock().now()))
    }

    /// Leeway the session's refresh trigger uses: the running loop's, else
    /// the client's.
    pub fn effective_leeway(&self, session: &Session) -> u64 {
        session.loop_leeway().unwrap_or(self.config.leeway_secs)
    }

    /// Whether the session is expired under `leeway`, or the effective
    /// leeway when `None`.
    pub fn is_expired(&self, session: &Session, leeway: Option<u64>) -> bool {
        let leeway = leeway.unwrap_or_else(|| self.effective_leeway(session));
        session.is_expired(self.refresher.clock(), leeway)
    }

    /// Non-empty access token that is not expired under the effective leeway.
    pub fn is_authenticated(&self, session: &Session) -> bool {
        session.is_authenticated(self.refresher.clock(), self.effective_leeway(session))
    }

    /// Refresh now, whatever the expiry. Errors are returned unmodified.
    pub async fn refresh(&self, session: &Session) -> Result<SessionTokens, RefreshError> {
        self.refresher.refresh(session).await
    }

    /// Access token for an authenticated call, refreshing first if expired.
    ///
    /// Makes at most one refresh attempt; retrying is the background loop's job.
    pub async fn access_token(&self, session: &Session) -> Result<String, RefreshError> {
        let leeway = self.effective_leeway(session);
        let tokens = self.refresher.ensure_fresh(session, leeway).await?;
        if tokens.access_token.is_empty() {
            return Err(RefreshError::InvalidState);
        }
        Ok(tokens.access_token)
    }

    pub async fn start_auto_refresh(&self, session: &Arc<Session>) {
        self.scheduler.start(session).await;
    }

    /// Start the background loop with timing that differs from the client's.
    ///
    /// While it runs, its leeway also governs this session's expiry checks.
    pub async fn start_auto_refresh_with(
        &self,
        session: &Arc<Session>,
        config: &RefreshConfig,
    ) -> anyhow::Result<()> {
        AutoRefreshScheduler::new(self.refresher.clone(), config)?.start(session).await;
        Ok(())
    }

    pub async fn stop_auto_refresh(&self, session: &Session) {
        self.scheduler.stop(session).await;
    }

    /// Invalidate the session locally, then tell the backend.
    ///
    /// Backend failures are logged and never block local invalidation.
    pub async fn sign_out(&self, session: &Session) {
        self.scheduler.stop(session).await;
        let access_token = session.clear();
        session.emit(SessionEvent::SignedOut);
        tracing::info!("session signed out");

        if access_token.is_empty() {
            return;
        }
        if let Err(e) = self.refresher.backend().sign_out(&access_token).await {
            tracing::warn!(err = %e, "backend sign-out failed");
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
