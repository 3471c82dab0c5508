// Configuration file handling

use crate::backend::{FileBackend, KvBackend, SqliteBackend};
use crate::store::DEFAULT_STORAGE_KEY;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "workledger";
const CONFIG_FILE: &str = "config.yml";
const SQLITE_FILE: &str = "workledger.db";

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file per key in `data_dir`
    #[default]
    File,
    /// A SQLite database in `data_dir`
    Sqlite,
}

/// Settings read from `config.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: Self::default_data_dir(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Platform data directory, or `./workledger` when there is none
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
    }

    /// Platform config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when `path` is None.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            debug!(file = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).wrap_err_with(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid configuration")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }

    /// Open the configured persistence backend
    pub fn open_backend(&self) -> Result<Box<dyn KvBackend>> {
        debug!(backend = ?self.backend, dir = ?self.data_dir, "Opening backend");
        match self.backend {
            BackendKind::File => Ok(Box::new(FileBackend::open(&self.data_dir)?)),
            BackendKind::Sqlite => Ok(Box::new(SqliteBackend::open(self.data_dir.join(SQLITE_FILE))?)),
        }
    }
}
