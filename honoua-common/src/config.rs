//! Configuration loading and data folder resolution
//!
//! Priority order, highest first:
//! 1. Command-line argument
//! 2. Environment variable (`HONOUA_CONFIG`, `HONOUA_DATA_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default
//!
//! A missing config file is never fatal: defaults are used and the caller
//! logs a warning once logging is up. A file that exists but does not parse
//! is reported as [`Error::Config`].

use crate::budget::BUDGET_PER_PERSON_KG;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::scan_filter::ScanFilterConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "HONOUA_CONFIG";
pub const DATA_FOLDER_ENV_VAR: &str = "HONOUA_DATA_FOLDER";

pub const DEFAULT_API_BASE: &str = "https://api.honoua.com";

/// SQLite file inside the data folder
pub const DATABASE_FILE: &str = "honoua.db";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub config_file: Option<PathBuf>,
    pub log_level: String,
    pub api_base: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        // ~/.local/share/honoua, ~/Library/Application Support/honoua,
        // %LOCALAPPDATA%\honoua
        let data_folder = dirs::data_local_dir()
            .map(|d| d.join("honoua"))
            .unwrap_or_else(|| PathBuf::from("./honoua_data"));

        let config_file = dirs::config_dir().map(|d| d.join("honoua").join("config.toml"));

        Self {
            data_folder,
            config_file,
            log_level: "info".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub per_person_kg: f64,
    /// Used until a household size has been saved locally
    pub household_size: Option<u32>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_person_kg: BUDGET_PER_PERSON_KG,
            household_size: None,
        }
    }
}

/// Contents of `config.toml`
///
/// ```toml
/// data_folder = "/home/me/.local/share/honoua"
/// api_base = "https://api.honoua.com"
/// history_limit = 30
///
/// [logging]
/// level = "debug"
///
/// [scan]
/// stability_window_ms = 900
/// cooldown_ms = 3000
/// min_repeats = 2
///
/// [budget]
/// per_person_kg = 2000.0
/// household_size = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub api_base: Option<String>,
    pub history_limit: usize,
    pub logging: LoggingConfig,
    pub scan: ScanFilterConfig,
    pub budget: BudgetConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            api_base: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            logging: LoggingConfig::default(),
            scan: ScanFilterConfig::default(),
            budget: BudgetConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Configured API base, else the compiled default
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE)
    }
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Path resolved but nothing there; defaults in use
    Missing(PathBuf),
    /// No config directory on this platform; defaults in use
    Unresolved,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    /// Report the config source; call after the subscriber is installed
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigSource::Unresolved => {
                warn!("No config directory available, using compiled defaults")
            }
        }
    }
}

/// Config file path: CLI → `HONOUA_CONFIG` → platform config dir
pub fn config_file_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    CompiledDefaults::for_current_platform().config_file
}

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = config_file_path(cli_arg) else {
        return Ok(LoadedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::Unresolved,
        });
    };

    if !path.exists() {
        return Ok(LoadedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::Missing(path),
        });
    }

    let config = TomlConfig::load(&path)?;
    Ok(LoadedConfig {
        config,
        source: ConfigSource::File(path),
    })
}

/// Data folder resolution following the priority order above
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.data_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().data_folder
    }
}

impl Default for DataFolderResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the data folder and locates the database inside it
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_folder)?;
        Ok(())
    }
}
