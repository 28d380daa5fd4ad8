//! Error types for the Apolomics REST API

use thiserror::Error;

/// Errors that can occur when talking to the course API
#[derive(Debug, Error)]
pub enum ApiError {
    /// No token is held by the current session
    #[error("Not signed in. Run `apolomics login` first")]
    NotAuthenticated,

    /// Server rejected the token (401/403)
    #[error("Session rejected by server ({status}): {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Error message from the server
        message: String,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the server
        message: String,
    },

    /// Configured base URL cannot be used to build request URLs
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// Failed to access system keyring
    #[error("Failed to access keyring: {0}")]
    KeyringError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ApiError {
    /// Check if this error is recoverable (user can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::RequestError(_) => true,
            ApiError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error requires re-authentication
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::NotAuthenticated | ApiError::Unauthorized { .. })
    }
}
