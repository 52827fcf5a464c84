//! API key settings consumed by the generation client

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StudioResult;

/// Settings blob as persisted by the studio (camelCase keys)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    pub use_custom_key: bool,
    pub api_key: String,
}

impl ApiSettings {
    /// The user's own key, only when enabled and non-blank
    pub fn effective_api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (self.use_custom_key && !key.is_empty()).then_some(key)
    }
}

/// Key/value store for [`ApiSettings`] backed by a JSON file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings; a missing or unreadable blob yields the defaults
    pub fn load(&self) -> ApiSettings {
        match fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), error = %err, "malformed settings, using defaults");
                ApiSettings::default()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved settings");
                ApiSettings::default()
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read settings, using defaults");
                ApiSettings::default()
            }
        }
    }

    /// Loads, applies `change`, persists and returns the new settings
    pub fn update(&self, change: impl FnOnce(&mut ApiSettings)) -> StudioResult<ApiSettings> {
        let mut settings = self.load();
        change(&mut settings);
        self.save(&settings)?;
        debug!(path = %self.path.display(), custom_key = settings.use_custom_key, "settings saved");
        Ok(settings)
    }

    pub fn save(&self, settings: &ApiSettings) -> StudioResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(settings)?)?;
        Ok(())
    }
}
