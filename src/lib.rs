//! Apolomics - course progression client
//!
//! Apolomics tracks a student's way through a video course: lectures unlock
//! one after another, then an instructor-reviewed assignment, a single-attempt
//! exam and finally a certificate. All progress is persisted server side.

pub mod api;
pub mod config;
pub mod progression;

pub use api::{ApiClient, ApiError, AuthSession, CourseApi};
pub use config::{Config, Session};
pub use progression::{CourseProgression, CourseProgressionState, ProgressionError, SyncLayer};
