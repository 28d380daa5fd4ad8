//! Apolomics REST API integration module
//!
//! Provides session credentials, the HTTP client, wire models and an
//! in-memory backend for tests.

pub mod auth;
pub mod client;
pub mod error;
pub mod mock;
pub mod models;
pub mod traits;

// Re-export commonly used types
pub use auth::{AuthSession, TokenStore, UserIdentity};
pub use client::ApiClient;
pub use error::ApiError;
pub use mock::MockApi;
pub use models::*;
pub use traits::CourseApi;
