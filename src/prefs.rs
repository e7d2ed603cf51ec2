//! User preference persistence
//!
//! Display preferences outlive a chat session. The only one today is the
//! dashboard dark-mode toggle, stored as a small JSON document.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted display preferences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub dark_mode: bool,
}

impl Preferences {
    /// Flip dark mode, returning the new value
    pub fn toggle_dark_mode(&mut self) -> bool {
        self.dark_mode = !self.dark_mode;
        self.dark_mode
    }
}

/// Trait for persisting preferences
pub trait PreferenceStore: Send + Sync {
    /// Save preferences, replacing what was stored
    fn save(&self, preferences: &Preferences) -> Result<()>;

    /// Load preferences; defaults when nothing was saved yet
    fn load(&self) -> Result<Preferences>;
}

/// Load, toggle dark mode, save. Returns the new value.
pub fn toggle_dark_mode(store: &dyn PreferenceStore) -> Result<bool> {
    let mut preferences = store.load()?;
    let dark_mode = preferences.toggle_dark_mode();
    store.save(&preferences)?;
    Ok(dark_mode)
}

/// JSON file-based preference store
///
/// Writes go to a temp file that is then renamed over the target.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn save(&self, preferences: &Preferences) -> Result<()> {
        let json = serde_json::to_string_pretty(preferences)?;
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Preferences(format!(
                    "Failed to create preferences directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&tmp_path, json).map_err(|e| {
            SessionError::Preferences(format!(
                "Failed to write preferences file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            SessionError::Preferences(format!(
                "Failed to rename preferences file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            dark_mode = preferences.dark_mode,
            "Preferences saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            SessionError::Preferences(format!(
                "Failed to read preferences file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let preferences: Preferences = serde_json::from_str(&json).map_err(|e| {
            SessionError::Preferences(format!(
                "Failed to parse preferences file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Preferences loaded");
        Ok(preferences)
    }
}

/// In-memory preference store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryPreferenceStore {
    state: std::sync::RwLock<Preferences>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn save(&self, preferences: &Preferences) -> Result<()> {
        let mut state = self.state.write().map_err(|e| {
            SessionError::Preferences(format!("Failed to acquire preferences lock: {}", e))
        })?;
        *state = *preferences;
        Ok(())
    }

    fn load(&self) -> Result<Preferences> {
        let state = self.state.read().map_err(|e| {
            SessionError::Preferences(format!("Failed to acquire preferences lock: {}", e))
        })?;
        Ok(*state)
    }
}
