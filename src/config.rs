use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::{ColdStartPolicy, Timeouts};
use crate::sync::ReloadPolicy;

const LOCAL_URL: &str = "http://localhost:3000/api";
const DEPLOYED_URL: &str = "https://mth-server.onrender.com/api";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub server: ServerConfig,
  pub sync: SyncConfig,
  pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Target {
  /// Development server on this machine
  Local,
  /// Hosted instance that sleeps when idle
  #[default]
  Deployed,
}

impl Target {
  pub fn default_url(self) -> &'static str {
    match self {
      Target::Local => LOCAL_URL,
      Target::Deployed => DEPLOYED_URL,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub target: Target,
  /// Explicit base URL, wins over `target`
  pub url: Option<String>,
  pub health_timeout_secs: u64,
  pub request_timeout_secs: u64,
  pub write_timeout_secs: u64,
  pub cold_start: ColdStartConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      target: Target::default(),
      url: None,
      health_timeout_secs: 5,
      request_timeout_secs: 60,
      write_timeout_secs: 60,
      cold_start: ColdStartConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColdStartConfig {
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  pub max_delay_ms: u64,
}

impl Default for ColdStartConfig {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      base_delay_ms: 2000,
      max_delay_ms: 10_000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub max_retries: u32,
  pub retry_delay_ms: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      retry_delay_ms: 5000,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// SQLite file (defaults to the platform data dir)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mth.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mth/config.yaml
  ///
  /// Without a file every setting takes its default.
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
    let local = PathBuf::from("mth.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mth").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> serde_yaml::Result<Self> {
    // an empty file deserializes to unit, not to an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Base URL before any stored override: `MTH_SERVER_URL`, then
  /// `server.url`, then the target's default.
  pub fn server_url(&self) -> String {
    Self::resolve_url(std::env::var("MTH_SERVER_URL").ok(), &self.server)
  }

  fn resolve_url(env: Option<String>, server: &ServerConfig) -> String {
    env
      .filter(|u| !u.trim().is_empty())
      .or_else(|| server.url.clone())
      .unwrap_or_else(|| server.target.default_url().to_string())
  }

  pub fn timeouts(&self) -> Timeouts {
    Timeouts {
      health: Duration::from_secs(self.server.health_timeout_secs),
      read: Duration::from_secs(self.server.request_timeout_secs),
      write: Duration::from_secs(self.server.write_timeout_secs),
    }
  }

  pub fn cold_start_policy(&self) -> ColdStartPolicy {
    let c = &self.server.cold_start;
    ColdStartPolicy {
      max_attempts: c.max_attempts,
      base_delay: Duration::from_millis(c.base_delay_ms),
      max_delay: Duration::from_millis(c.max_delay_ms),
    }
  }

  pub fn reload_policy(&self) -> ReloadPolicy {
    ReloadPolicy {
      max_retries: self.sync.max_retries,
      delay: Duration::from_millis(self.sync.retry_delay_ms),
    }
  }
}
