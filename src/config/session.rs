//! Session identity persistence
//!
//! Stores who is signed in and the last opened course between runs. The token
//! lives in the keyring (see [`crate::api::TokenStore`]), never in this file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Config;
use crate::api::{Id, UserIdentity};

/// Persisted session state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Signed-in user id (if any)
    pub user_id: Option<Id>,
    /// Display name of the signed-in user
    #[serde(default)]
    pub username: Option<String>,
    /// Last course opened
    #[serde(default)]
    pub current_course_id: Option<Id>,
}

impl Session {
    /// Load session from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::session_path()?)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::session_path()?)
    }

    /// Load session from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session from {:?}", path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse session.json")
        } else {
            Ok(Self::default())
        }
    }

    /// Save session to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize session")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write session to {:?}", path))?;

        Ok(())
    }

    /// Get the path to the session file
    fn session_path() -> Result<PathBuf> {
        Ok(Config::data_dir()?.join("session.json"))
    }

    /// Identity of the signed-in user, if there is one
    pub fn identity(&self) -> Option<UserIdentity> {
        self.user_id.map(|id| UserIdentity { id, username: self.username.clone() })
    }

    /// Forget the signed-in user
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
