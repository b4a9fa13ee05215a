// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::UDL_CODE_LEN;
use crate::error::{BridgeError, Result};

/// Small record that survives restarts.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub udl_code: String,
    pub debug: bool,
}

impl Settings {
    /// Replace the UDL code. Must be exactly six characters.
    pub fn set_udl_code(&mut self, code: &str) -> Result<()> {
        if code.len() != UDL_CODE_LEN {
            return Err(BridgeError::InvalidUdlCode);
        }
        self.udl_code = code.to_string();
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("udl_code", &if self.udl_code.is_empty() { "<unset>" } else { "<redacted>" })
            .field("debug", &self.debug)
            .finish()
    }
}

/// Where `Settings` are kept between runs.
pub trait SettingsStore: Send {
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// JSON file store. A missing file loads as defaults.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let settings: Settings = serde_json::from_str(&text)?;
                debug!("Loaded {:?} from {}", settings, self.path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", self.path.display());
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let text = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, text)?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("texecom2mqtt-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let store = FileSettingsStore::new(temp_path("missing"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let store = FileSettingsStore::new(&path);
        let mut settings = Settings::default();
        settings.set_udl_code("654321").unwrap();
        settings.debug = true;
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_udl_code_length() {
        let mut settings = Settings::default();
        assert!(matches!(settings.set_udl_code("12345"), Err(BridgeError::InvalidUdlCode)));
        assert!(settings.udl_code.is_empty());
    }

    #[test]
    fn test_debug_output_hides_code() {
        let settings = Settings { udl_code: "999999".to_string(), debug: false };
        assert!(!format!("{settings:?}").contains("999999"));
    }
}
