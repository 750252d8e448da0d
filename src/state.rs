use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::seed;
use crate::services::dashboard::DEFAULT_ACTIVITY_LIMIT;
use crate::store::{CollectionStore, FileStore, MemoryStore, SqliteStore, Storage};

/// Which `CollectionStore` backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

fn default_page_size() -> usize {
    10
}

fn default_activity_limit() -> usize {
    DEFAULT_ACTIVITY_LIMIT
}

/// `~/.clientcore/config.json`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub storage: StorageBackend,
    /// Directory for the database or JSON files. Defaults to `~/.clientcore`.
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub seed_defaults: bool,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_activity_limit")]
    pub recent_activity_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageBackend::default(),
            data_dir: None,
            seed_defaults: false,
            default_page_size: default_page_size(),
            recent_activity_limit: default_activity_limit(),
        }
    }
}

impl Config {
    /// Resolved data directory, expanding a leading `~`.
    pub fn data_dir(&self) -> Result<PathBuf, String> {
        match self.data_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => {
                if let Some(rest) = dir.strip_prefix("~/") {
                    let home = dirs::home_dir().ok_or("Could not find home directory")?;
                    Ok(home.join(rest))
                } else {
                    Ok(PathBuf::from(dir))
                }
            }
            _ => {
                let home = dirs::home_dir().ok_or("Could not find home directory")?;
                Ok(home.join(".clientcore"))
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".clientcore").join("config.json"))
}

/// Load `~/.clientcore/config.json`. A missing file means defaults.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    let config: Config =
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;

    if config.default_page_size == 0 || config.default_page_size > 100 {
        return Err(format!(
            "defaultPageSize must be between 1 and 100, got {}",
            config.default_page_size
        ));
    }
    Ok(config)
}

/// Config plus the storage it selected. Shared by the CLI and the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, String> {
        let backend: Arc<dyn CollectionStore> = match config.storage {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Sqlite => {
                let path = config.data_dir()?.join("clientcore.db");
                Arc::new(
                    SqliteStore::open_at(path.clone())
                        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?,
                )
            }
            StorageBackend::File => {
                let dir = config.data_dir()?.join("collections");
                Arc::new(
                    FileStore::open(&dir)
                        .map_err(|e| format!("Failed to open {}: {}", dir.display(), e))?,
                )
            }
        };
        let storage = Storage::new(backend);
        log::info!("Using {} store", storage.backend_name());

        if config.seed_defaults {
            match seed::seed_defaults(&storage) {
                Ok(report) if !report.seeded.is_empty() => {
                    log::info!("Seeded defaults into {} collection(s)", report.seeded.len())
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to seed default data: {}", e),
            }
        }

        Ok(Self { config, storage })
    }

    /// In-memory state with default config. Used by tests.
    pub fn in_memory() -> Self {
        Self {
            config: Config {
                storage: StorageBackend::Memory,
                ..Config::default()
            },
            storage: Storage::in_memory(),
        }
    }
}
