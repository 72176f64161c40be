// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Failure of a refresh or sign-out exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// The session has no refresh token to exchange.
    #[error("session has no refresh token")]
    InvalidState,
    /// The backend answered with a non-success status.
    #[error("auth backend rejected request ({status}): {message}")]
    Backend { status: u16, message: String },
    /// The request never got a response.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The operation was stopped on purpose.
    #[error("refresh cancelled")]
    Cancelled,
}

impl RefreshError {
    /// Whether the background loop should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Transport(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidState => "INVALID_STATE",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl From<reqwest::Error> for RefreshError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
