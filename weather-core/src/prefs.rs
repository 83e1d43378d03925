//! Typed access to the per-user preference store.
//!
//! Values are kept as JSON text under string keys. Every setting is read
//! independently with its own default, so one corrupt entry never affects
//! the others.

use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

use crate::model::{TemperatureUnit, Theme};

pub const KEY_TEMPERATURE_UNIT: &str = "skycast-temp-unit";
pub const KEY_LAST_CITY: &str = "skycast-last-city";
pub const KEY_DEFAULT_LOCATION: &str = "skycast-default-location";
pub const KEY_LOCATION_ENABLED: &str = "skycast-location-enabled";
pub const KEY_THEME: &str = "skycast-theme";
pub const KEY_LOCATION_CONSENT: &str = "skycast-location-consent";

pub const DEFAULT_CITY: &str = "Asansol";

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("Failed to write preferences to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode preference '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw string key/value persistence.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), PreferenceError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), PreferenceError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// A single JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        Self { path, entries: Mutex::new(entries) }
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read preferences, using defaults");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Corrupt preferences file, using defaults");
            BTreeMap::new()
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
        let io_err = |source| PreferenceError::Io { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(entries).map_err(|source| {
            PreferenceError::Encode { key: "<all>".to_string(), source }
        })?;

        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), PreferenceError> {
        let Ok(mut entries) = self.entries.lock() else {
            return Ok(());
        };
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }
}

/// One accessor per logical setting, each with an explicit default.
#[derive(Debug, Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.store.get(key) else {
            return default;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Ignoring corrupt preference value");
                default
            }
        }
    }

    /// Write failures are logged; a preference that fails to persist never
    /// fails the operation that changed it.
    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|source| PreferenceError::Encode { key: key.to_string(), source })
            .and_then(|raw| self.store.set(key, raw));

        match result {
            Ok(()) => debug!(key, "Preference saved"),
            Err(e) => warn!(key, error = %e, "Failed to save preference"),
        }
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.read(KEY_TEMPERATURE_UNIT, TemperatureUnit::Metric)
    }

    pub fn set_temperature_unit(&self, unit: TemperatureUnit) {
        self.write(KEY_TEMPERATURE_UNIT, &unit);
    }

    pub fn last_searched_city(&self) -> String {
        self.read(KEY_LAST_CITY, DEFAULT_CITY.to_string())
    }

    pub fn set_last_searched_city(&self, city: &str) {
        self.write(KEY_LAST_CITY, &city);
    }

    pub fn default_location(&self) -> String {
        self.read(KEY_DEFAULT_LOCATION, DEFAULT_CITY.to_string())
    }

    pub fn set_default_location(&self, city: &str) {
        self.write(KEY_DEFAULT_LOCATION, &city);
    }

    pub fn location_enabled(&self) -> bool {
        self.read(KEY_LOCATION_ENABLED, false)
    }

    pub fn set_location_enabled(&self, enabled: bool) {
        self.write(KEY_LOCATION_ENABLED, &enabled);
    }

    /// The user's answer to a consent prompt on platforms that have no
    /// permission system of their own. `None` until asked.
    pub fn location_consent(&self) -> Option<bool> {
        self.read(KEY_LOCATION_CONSENT, None)
    }

    pub fn set_location_consent(&self, consent: Option<bool>) {
        self.write(KEY_LOCATION_CONSENT, &consent);
    }

    pub fn theme(&self) -> Theme {
        self.read(KEY_THEME, Theme::Light)
    }

    pub fn set_theme(&self, theme: Theme) {
        self.write(KEY_THEME, &theme);
    }
}
