//! Bootstrap configuration loading and root folder resolution
//!
//! The TOML file carries bootstrap concerns only (where data lives, where to
//! listen, how to log, how to reach the AI collaborators). Runtime tuning such
//! as duplicate thresholds lives in the database `settings` table.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CIVIC_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database, index snapshot and uploaded images
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Image captioning provider
    #[serde(default)]
    pub captioner: CaptionerConfig,

    /// Image embedding provider
    #[serde(default)]
    pub embedder: EmbedderConfig,

    /// Public URL prefix under which stored images are served
    #[serde(default)]
    pub image_base_url: Option<String>,

    /// Shared secret the gateway presents when asserting staff identity
    #[serde(default)]
    pub staff_secret: Option<String>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            captioner: CaptionerConfig::default(),
            embedder: EmbedderConfig::default(),
            image_base_url: None,
            staff_secret: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Vision captioning provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionerConfig {
    #[serde(default = "default_captioner_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_captioner_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CaptionerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_captioner_endpoint(),
            model: default_captioner_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Image embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Endpoint accepting raw image bytes and answering `{"embedding": [...]}`;
    /// no endpoint means visual duplicate detection is disabled
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_captioner_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_captioner_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Load TOML configuration from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load TOML configuration from the platform default location, falling back
/// to built-in defaults when no file exists
pub fn load_default_toml_config() -> Result<TomlConfig> {
    match default_config_path() {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Write TOML configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Platform default config file: `<config dir>/civic/civic-intake.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("civic").join("civic-intake.toml"))
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("civic"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/civic"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("civic"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/civic"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("civic"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\civic"))
    } else {
        PathBuf::from("./civic_data")
    }
}

/// Lays out the files that live under the root folder
#[derive(Debug, Clone)]
pub struct RootFolderLayout {
    root: PathBuf,
}

impl RootFolderLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder and its subdirectories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.index_dir())?;
        std::fs::create_dir_all(self.uploads_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("civic.db")
    }

    /// Directory holding the visual index snapshot pair
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 5780);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert!(config.captioner.api_key.is_none());
        assert!(config.embedder.endpoint.is_none());
    }

    #[test]
    fn test_layout_paths() {
        let layout = RootFolderLayout::new(PathBuf::from("/data/civic"));
        assert_eq!(layout.database_path(), PathBuf::from("/data/civic/civic.db"));
        assert_eq!(layout.index_dir(), PathBuf::from("/data/civic/index"));
        assert_eq!(layout.uploads_dir(), PathBuf::from("/data/civic/uploads"));
    }
}
