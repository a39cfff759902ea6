use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::{Tier, APP_CACHE_PREFIX, DEFAULT_TTL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file backing the device-scoped tier
  pub device_path: Option<PathBuf>,
  /// Byte quota per tier (keys plus values); unlimited when unset
  pub quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Key prefix for CLI operations
  #[serde(default = "default_prefix")]
  pub prefix: String,
  /// TTL for writes that don't specify one
  #[serde(default = "default_ttl_ms")]
  pub default_ttl_ms: u64,
  /// CLI tier; the session tier does not outlive a single invocation
  #[serde(default = "default_tier")]
  pub default_tier: Tier,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: default_prefix(),
      default_ttl_ms: default_ttl_ms(),
      default_tier: default_tier(),
    }
  }
}

fn default_prefix() -> String {
  APP_CACHE_PREFIX.to_string()
}

fn default_tier() -> Tier {
  Tier::Device
}

fn default_ttl_ms() -> u64 {
  DEFAULT_TTL.as_millis() as u64
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Filter directive used when RUST_LOG is not set
  #[serde(default = "default_level")]
  pub level: String,
  /// Write logs here instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_level(),
      file: None,
    }
  }
}

fn default_level() -> String {
  "warn".to_string()
}

impl StorageConfig {
  /// Path of the device-scoped database.
  ///
  /// Order: `device_path` from config, `PORTAL_CACHE_DB`, then
  /// `<data_dir>/portal-cache/cache.db`.
  pub fn resolved_device_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.device_path {
      return Ok(path.clone());
    }

    if let Ok(path) = std::env::var("PORTAL_CACHE_DB") {
      if !path.is_empty() {
        return Ok(PathBuf::from(path));
      }
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("portal-cache").join("cache.db"))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./portal-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/portal-cache/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("portal-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("portal-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }
}
