// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::AuthBackend;
use crate::clock::Clock;
use crate::error::RefreshError;
use crate::session::{Session, SessionTokens, TokenGrant, User};

/// Epoch seconds at which every [`PausedClock`] starts.
pub const T0: u64 = 1_700_000_000;

/// Clock that follows tokio's (paused) runtime time, starting at [`T0`].
pub struct PausedClock {
    start: tokio::time::Instant,
}

impl PausedClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { start: tokio::time::Instant::now() })
    }
}

impl Clock for PausedClock {
    fn now(&self) -> u64 {
        T0 + self.start.elapsed().as_secs()
    }
}

/// Clock pinned to a fixed instant.
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

pub fn grant(n: u32, expires_in: u64) -> TokenGrant {
    TokenGrant {
        access_token: format!("access-{n}"),
        refresh_token: format!("refresh-{n}"),
        expires_in,
        token_type: "bearer".to_owned(),
        user: Some(User { id: format!("user-{n}"), ..User::default() }),
    }
}

/// Session holding `access-0`/`refresh-0` that expires at `expires_at`.
pub fn session(expires_at: u64) -> Arc<Session> {
    Arc::new(Session::new(SessionTokens {
        access_token: "access-0".to_owned(),
        refresh_token: "refresh-0".to_owned(),
        expires_at,
        token_type: "bearer".to_owned(),
        user: None,
    }))
}

/// Scripted backend.
///
/// Pops one result per refresh call. When the script is empty it hands out
/// numbered grants lasting `fallback_expires_in` seconds.
pub struct MockBackend {
    script: Mutex<VecDeque<Result<TokenGrant, RefreshError>>>,
    fallback_expires_in: u64,
    latency: Duration,
    refresh_calls: AtomicU32,
    sign_out_calls: AtomicU32,
    sign_out_result: Mutex<Result<(), RefreshError>>,
    seen_tokens: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(fallback_expires_in: u64) -> Arc<Self> {
        Self::build(fallback_expires_in, Duration::ZERO)
    }

    /// Backend whose refresh takes `latency` of runtime time to answer.
    pub fn with_latency(fallback_expires_in: u64, latency: Duration) -> Arc<Self> {
        Self::build(fallback_expires_in, latency)
    }

    fn build(fallback_expires_in: u64, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback_expires_in,
            latency,
            refresh_calls: AtomicU32::new(0),
            sign_out_calls: AtomicU32::new(0),
            sign_out_result: Mutex::new(Ok(())),
            seen_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, result: Result<TokenGrant, RefreshError>) {
        self.script.lock().push_back(result);
    }

    pub fn fail_times(&self, n: usize) {
        for _ in 0..n {
            let message = "unavailable".to_owned();
            self.push(Err(RefreshError::Backend { status: 503, message }));
        }
    }

    pub fn fail_sign_out(&self, err: RefreshError) {
        *self.sign_out_result.lock() = Err(err);
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented so far, in call order.
    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().clone()
    }
}

impl AuthBackend for MockBackend {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>> {
        Box::pin(async move {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen_tokens.lock().push(refresh_token.to_owned());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| Ok(grant(n, self.fallback_expires_in)))
        })
    }

    fn sign_out<'a>(
        &'a self,
        _access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RefreshError>> + Send + 'a>> {
        Box::pin(async move {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            self.sign_out_result.lock().clone()
        })
    }
}

/// Let spawned tasks run until they block on timers or channels.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
