//! Session credentials and token storage
//!
//! The signed-in user and token travel in an explicit [`AuthSession`] handed to
//! the HTTP client; nothing is kept in process-wide header state. The token
//! itself is persisted in the system keyring by [`TokenStore`].

use std::fmt;
use std::sync::Arc;

use keyring::Entry;

use super::error::ApiError;
use super::models::Id;

/// Service name for keyring storage
const SERVICE_NAME: &str = "apolomics-client";
/// Entry name for the session token
const TOKEN_ENTRY: &str = "session-token";

/// Callback invoked whenever a request fails authentication
pub type UnauthorizedHook = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Id,
    pub username: Option<String>,
}

/// Credentials of the current session
#[derive(Clone)]
pub struct AuthSession {
    token: Option<String>,
    user: UserIdentity,
    scheme: String,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl AuthSession {
    /// Create a session for a user with the given token
    pub fn new(user: UserIdentity, token: Option<String>) -> Self {
        Self { token, user, scheme: "Token".to_string(), on_unauthorized: None }
    }

    /// Use a different authorization scheme (e.g. `Bearer`)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Register the callback fired on authentication failures
    pub fn on_unauthorized(mut self, hook: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    /// The signed-in user
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Value of the `Authorization` header, or `NotAuthenticated`
    pub fn authorization(&self) -> Result<String, ApiError> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(format!("{} {}", self.scheme, token)),
            _ => Err(self.reject(ApiError::NotAuthenticated)),
        }
    }

    /// Notify the unauthorized hook and hand the error back
    pub fn reject(&self, error: ApiError) -> ApiError {
        if let Some(hook) = &self.on_unauthorized {
            hook(&error);
        }
        error
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user", &self.user)
            .field("scheme", &self.scheme)
            .field("token", &self.token.as_deref().map(TokenStore::mask_token))
            .finish()
    }
}

/// Manages the session token in the system keyring
pub struct TokenStore;

impl TokenStore {
    /// Get the token from system keyring
    pub fn get_token() -> Result<String, ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => ApiError::NotAuthenticated,
            _ => ApiError::KeyringError(e.to_string()),
        })
    }

    /// Store the token in system keyring
    pub fn set_token(token: &str) -> Result<(), ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        entry.set_password(token.trim()).map_err(|e| ApiError::KeyringError(e.to_string()))
    }

    /// Delete the stored token
    pub fn delete_token() -> Result<(), ApiError> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_ENTRY)
            .map_err(|e| ApiError::KeyringError(e.to_string()))?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ApiError::KeyringError(e.to_string())),
        }
    }

    /// Mask a token for display (show first and last 4 chars)
    pub fn mask_token(token: &str) -> String {
        if token.len() <= 12 {
            return "*".repeat(token.len());
        }
        let prefix = &token[..4];
        let suffix = &token[token.len() - 4..];
        format!("{}...{}", prefix, suffix)
    }
}
