// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record: current tokens, expiry, user identity.
//!
//! Token fields live behind one lock and are always replaced together, so a
//! reader never sees a new access token paired with an old expiry. The session
//! also owns the runtime pieces around it: the refresh lock that serializes
//! exchanges, the handle of the background loop and the event channel.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};

use crate::clock::Clock;
use crate::scheduler::{RefreshHandle, SchedulerState};

/// Identity record returned by the backend alongside tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub user_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Token material from a login or refresh exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds, relative to receipt.
    pub expires_in: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// Consistent snapshot of a session's token fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds.
    pub expires_at: u64,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl SessionTokens {
    /// Anchor a grant at `now`.
    pub fn from_grant(grant: TokenGrant, now: u64) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: now.saturating_add(grant.expires_in),
            token_type: grant.token_type,
            user: grant.user,
        }
    }

    /// Expired once `now` reaches `expires_at - leeway`.
    pub fn is_expired_at(&self, now: u64, leeway: u64) -> bool {
        now >= self.expires_at.saturating_sub(leeway)
    }

    pub fn is_authenticated_at(&self, now: u64, leeway: u64) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now, leeway)
    }
}

/// Events emitted for a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// New tokens were applied.
    Refreshed { expires_at: u64 },
    /// A background attempt failed and will be retried.
    RefreshFailed { attempt: u32, error: String },
    /// The background loop ran out of retries. The session must be treated
    /// as logged out.
    Exhausted { attempts: u32, error: String },
    /// Tokens were cleared by sign-out.
    SignedOut,
}

struct TokenState {
    tokens: SessionTokens,
    generation: u64,
}

/// A live auth session shared between callers and the background loop.
pub struct Session {
    state: parking_lot::RwLock<TokenState>,
    /// Held for the duration of a refresh exchange.
    pub(crate) refresh_lock: Mutex<()>,
    pub(crate) refresh_handle: Mutex<Option<RefreshHandle>>,
    /// Leeway of the running background loop, if any.
    loop_leeway: parking_lot::Mutex<Option<u64>>,
    pub(crate) scheduler: watch::Sender<SchedulerState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(tokens: SessionTokens) -> Self {
        let (events, _) = broadcast::channel(64);
        let (scheduler, _) = watch::channel(SchedulerState::Idle);
        Self {
            state: parking_lot::RwLock::new(TokenState { tokens, generation: 0 }),
            refresh_lock: Mutex::new(()),
            refresh_handle: Mutex::new(None),
            loop_leeway: parking_lot::Mutex::new(None),
            scheduler,
            events,
        }
    }

    /// Establish a session from a login grant received at `now`.
    pub fn from_grant(grant: TokenGrant, now: u64) -> Self {
        Self::new(SessionTokens::from_grant(grant, now))
    }

    /// Snapshot of the current token fields.
    pub fn tokens(&self) -> SessionTokens {
        self.state.read().tokens.clone()
    }

    pub fn access_token(&self) -> String {
        self.state.read().tokens.access_token.clone()
    }

    pub fn expires_at(&self) -> u64 {
        self.state.read().tokens.expires_at
    }

    /// Number of times the token fields have been replaced or cleared.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub(crate) fn snapshot(&self) -> (u64, SessionTokens) {
        let state = self.state.read();
        (state.generation, state.tokens.clone())
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.state.read().tokens.refresh_token.is_empty()
    }

    pub fn is_expired(&self, clock: &dyn Clock, leeway: u64) -> bool {
        self.state.read().tokens.is_expired_at(clock.now(), leeway)
    }

    pub fn is_authenticated(&self, clock: &dyn Clock, leeway: u64) -> bool {
        self.state.read().tokens.is_authenticated_at(clock.now(), leeway)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        *self.scheduler.borrow()
    }

    pub fn watch_scheduler(&self) -> watch::Receiver<SchedulerState> {
        self.scheduler.subscribe()
    }

    /// Leeway the background loop refreshes with, while one is running.
    ///
    /// Expiry checks on behalf of callers use it so they agree with the loop.
    pub fn loop_leeway(&self) -> Option<u64> {
        *self.loop_leeway.lock()
    }

    pub(crate) fn set_loop_leeway(&self, leeway: Option<u64>) {
        *self.loop_leeway.lock() = leeway;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Replace all token fields if nothing else replaced them since
    /// `expected_generation` was read. Returns the new snapshot on success.
    pub(crate) fn replace_if_current(
        &self,
        expected_generation: u64,
        tokens: SessionTokens,
    ) -> Option<SessionTokens> {
        let mut state = self.state.write();
        if state.generation != expected_generation {
            return None;
        }
        state.tokens = tokens;
        state.generation += 1;
        Some(state.tokens.clone())
    }

    /// Drop all token material. Returns the access token that was in use.
    pub(crate) fn clear(&self) -> String {
        let mut state = self.state.write();
        let previous = std::mem::take(&mut state.tokens);
        state.generation += 1;
        previous.access_token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("expires_at", &state.tokens.expires_at)
            .field("token_type", &state.tokens.token_type)
            .field("generation", &state.generation)
            .field("scheduler", &*self.scheduler.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
