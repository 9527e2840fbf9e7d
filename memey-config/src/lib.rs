use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DATA_DIR_NAME: &str = ".memey";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const TEMPLATES_FILE_NAME: &str = "templates.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    HomeDirUnavailable,
    #[error("failed to read or write configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Imgflip account credentials. Both fields are optional: an absent or
/// empty username means "not logged in" and captioning must be refused
/// before any request is attempted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Loads credentials from the persisted config file. Any failure on
    /// this path (missing file, unreadable file, invalid JSON) falls back
    /// to the logged-out default rather than erroring.
    pub fn load() -> Self {
        let Ok(path) = config_file_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(credentials) => {
                    debug!("config found at {}", path.display());
                    credentials
                }
                Err(error) => {
                    debug!(
                        "config at {} is invalid ({error}), using defaults",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(error) => {
                debug!("config not found ({error}), using defaults");
                Self::default()
            }
        }
    }

    /// Persists the whole credential structure, replacing any previous copy.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        ensure_parent_exists(path)?;
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.username
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

/// Path of the persisted credentials document, `~/.memey/config.json`.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(data_dir()?.join(CONFIG_FILE_NAME))
}

/// Path of the persisted template catalog, `~/.memey/templates.json`.
pub fn templates_file_path() -> Result<PathBuf, ConfigError> {
    Ok(data_dir()?.join(TEMPLATES_FILE_NAME))
}

fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dirs = BaseDirs::new().ok_or(ConfigError::HomeDirUnavailable)?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

fn ensure_parent_exists(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
