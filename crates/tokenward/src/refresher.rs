// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One refresh exchange against the backend, applied atomically to a session.

use std::sync::Arc;

use crate::backend::AuthBackend;
use crate::clock::Clock;
use crate::error::RefreshError;
use crate::session::{Session, SessionEvent, SessionTokens};

/// Performs refresh exchanges. Cheap to clone.
#[derive(Clone)]
pub struct TokenRefresher {
    backend: Arc<dyn AuthBackend>,
    clock: Arc<dyn Clock>,
}

impl TokenRefresher {
    pub fn new(backend: Arc<dyn AuthBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend> {
        &self.backend
    }

    /// Exchange the session's refresh token and replace its token fields.
    ///
    /// Only one exchange per session is in flight at a time. A caller that
    /// waited on another caller's successful exchange gets that result back
    /// without contacting the backend. On failure the session is unchanged.
    pub async fn refresh(&self, session: &Session) -> Result<SessionTokens, RefreshError> {
        let (observed, before) = session.snapshot();
        self.refresh_observed(session, observed, &before).await
    }

    /// Refresh on behalf of a caller that judged the tokens of generation
    /// `observed` stale. Any replacement after `observed` counts as the
    /// answer.
    pub(crate) async fn refresh_observed(
        &self,
        session: &Session,
        observed: u64,
        before: &SessionTokens,
    ) -> Result<SessionTokens, RefreshError> {
        if before.refresh_token.is_empty() {
            return Err(RefreshError::InvalidState);
        }

        let _flight = session.refresh_lock.lock().await;

        let (generation, current) = session.snapshot();
        if generation != observed {
            if current.refresh_token.is_empty() {
                return Err(RefreshError::InvalidState);
            }
            tracing::debug!(expires_at = current.expires_at, "reusing concurrent refresh result");
            return Ok(current);
        }

        let grant = self.backend.refresh(&current.refresh_token).await?;
        let tokens = SessionTokens::from_grant(grant, self.clock.now());
        let expires_at = tokens.expires_at;

        match session.replace_if_current(generation, tokens) {
            Some(applied) => {
                tracing::debug!(expires_at, "session tokens refreshed");
                session.emit(SessionEvent::Refreshed { expires_at });
                Ok(applied)
            }
            None => {
                // Signed out while the exchange was in flight.
                tracing::debug!("discarding refresh result for invalidated session");
                Err(RefreshError::Cancelled)
            }
        }
    }

    /// Refresh only if the session is expired under `leeway`.
    pub async fn ensure_fresh(
        &self,
        session: &Session,
        leeway: u64,
    ) -> Result<SessionTokens, RefreshError> {
        let (observed, tokens) = session.snapshot();
        if tokens.is_expired_at(self.clock.now(), leeway) {
            return self.refresh_observed(session, observed, &tokens).await;
        }
        Ok(tokens)
    }
}

#[cfg(test)]
#[path = "refresher_tests.rs"]
mod tests;
