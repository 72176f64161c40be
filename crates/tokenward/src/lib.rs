// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokenward: auth session lifecycle with background token refresh.
//!
//! A [`Session`] holds the current token pair obtained from an identity
//! backend. [`AuthClient`] refreshes it on demand, keeps it fresh in the
//! background through an [`AutoRefreshScheduler`] loop, and signs it out.

pub mod backend;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod refresher;
pub mod retry;
pub mod scheduler;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::AuthBackend;
pub use client::AuthClient;
pub use clock::{Clock, SystemClock};
pub use config::RefreshConfig;
pub use error::RefreshError;
pub use http::HttpBackend;
pub use refresher::TokenRefresher;
pub use retry::RetryPolicy;
pub use scheduler::{AutoRefreshScheduler, SchedulerState};
pub use session::{Session, SessionEvent, SessionTokens, TokenGrant, User};
