// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP identity backend speaking the GoTrue token endpoints.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::backend::AuthBackend;
use crate::error::RefreshError;
use crate::session::TokenGrant;

/// Backend reached over HTTP at `base_url` (e.g. `https://xyz.example.co/auth/v1`).
pub struct HttpBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        // reqwest is built without a default TLS provider.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, api_key: api_key.into(), client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn do_refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let resp = self
            .client
            .post(self.url("/token?grant_type=refresh_token"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = error_message(&text);
            return Err(RefreshError::Backend { status: status.as_u16(), message });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RefreshError::Backend {
            status: status.as_u16(),
            message: format!("invalid token response: {e}"),
        })
    }

    async fn do_sign_out(&self, access_token: &str) -> Result<(), RefreshError> {
        let resp = self
            .client
            .post(self.url("/logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = error_message(&text);
            return Err(RefreshError::Backend { status: status.as_u16(), message });
        }
        Ok(())
    }
}

impl AuthBackend for HttpBackend {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>> {
        Box::pin(self.do_refresh(refresh_token))
    }

    fn sign_out<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), RefreshError>> + Send + 'a>> {
        Box::pin(self.do_sign_out(access_token))
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = parsed.as_ref().and_then(|v| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(|m| m.as_str()))
    });
    match field {
        Some(msg) => msg.to_owned(),
        None => body.trim().to_owned(),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
