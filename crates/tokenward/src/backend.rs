// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::pin::Pin;

use crate::error::RefreshError;
use crate::session::TokenGrant;

/// Remote identity backend.
///
/// Object-safe for use as `Arc<dyn AuthBackend>`.
pub trait AuthBackend: Send + Sync + 'static {
    /// Exchange a refresh token for new token material.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>>;

    /// Revoke the session behind `access_token`.
    fn sign_out<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RefreshError>> + Send + 'a>>;
}
