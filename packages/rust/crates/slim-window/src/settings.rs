//! Settings persistence: retention config and cosmetic prefs as one JSON document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use slim_types::Settings;
use tracing::{debug, warn};

use crate::persistence::atomic_write_text;

const SETTINGS_FILE: &str = "settings.json";

/// Default settings location.
///
/// `$SLIM_CONFIG_HOME/settings.json` when set, otherwise
/// `$PRJ_DATA_HOME/thread-slim/settings.json`, otherwise
/// `./.data/thread-slim/settings.json`.
#[must_use]
pub fn default_settings_path() -> PathBuf {
    if let Some(home) = non_empty_env("SLIM_CONFIG_HOME") {
        return PathBuf::from(home).join(SETTINGS_FILE);
    }
    let data_home = non_empty_env("PRJ_DATA_HOME").map_or_else(
        || {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".data")
        },
        PathBuf::from,
    );
    data_home.join("thread-slim").join(SETTINGS_FILE)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// JSON file holding [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`default_settings_path`].
    #[must_use]
    pub fn at_default_path() -> Self {
        Self::new(default_settings_path())
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, merging stored keys over defaults.
    ///
    /// Never fails: a missing file yields defaults, an unreadable or malformed
    /// one yields defaults with a warning.
    #[must_use]
    pub fn load(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str::<Settings>(&text) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "malformed settings; using defaults");
                    Settings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file; using defaults");
                Settings::default()
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "unreadable settings; using defaults");
                Settings::default()
            }
        }
    }

    /// Persist settings atomically.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings).context("failed to encode settings")?;
        atomic_write_text(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_malformed_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsStore::new(path).load(), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("conf/settings.json"));
        let mut settings = Settings::default();
        settings.retention = slim_types::RetentionConfig::keeping(3);
        settings.prefs.selection_mode = true;
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }
}
