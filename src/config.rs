//! Loading server configuration (listing limits, cache TTL, users) from TOML.
//!
//! The file is optional; see `AppConfig` for the expected schema. A missing or
//! broken file never stops the server, defaults are used instead.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerCfg,
  #[serde(default)]
  pub users: Vec<UserCfg>,
  /// Load demo tags and questions at startup.
  #[serde(default)]
  pub seed_demo: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
  /// Prefix for resource URLs in payloads, e.g. "https://quiz.example.com".
  /// Empty means relative URLs.
  pub base_url: String,
  pub page_size: usize,
  pub max_page_size: usize,
  /// 0 disables the response cache.
  pub cache_ttl_secs: u64,
  /// Cached responses kept before the oldest third is culled.
  pub cache_max_entries: usize,
}

impl Default for ServerCfg {
  fn default() -> Self {
    Self {
      base_url: String::new(),
      page_size: 20,
      max_page_size: 100,
      cache_ttl_secs: 3600,
      cache_max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
    }
  }
}

/// User entry accepted in TOML configuration.
/// Without a token one is generated at startup and printed to the log.
#[derive(Clone, Debug, Deserialize)]
pub struct UserCfg {
  pub username: String,
  #[serde(default)]
  pub token: Option<String>,
  #[serde(default)]
  pub is_staff: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read { path: String, source: std::io::Error },
  #[error("failed to parse {path}: {source}")]
  Parse { path: String, source: toml::de::Error },
}

pub fn parse(s: &str, path: &str) -> Result<AppConfig, ConfigError> {
  toml::from_str::<AppConfig>(s).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

pub fn load_from_path(path: &str) -> Result<AppConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
  parse(&s, path)
}

/// Load `AppConfig` from QUIZBANK_CONFIG_PATH. Falls back to defaults on any error.
pub fn load_from_env() -> AppConfig {
  let Ok(path) = std::env::var("QUIZBANK_CONFIG_PATH") else {
    info!(target: "quizbank", "QUIZBANK_CONFIG_PATH not set; using defaults");
    return AppConfig::default();
  };
  match load_from_path(&path) {
    Ok(cfg) => {
      info!(target: "quizbank", %path, users = cfg.users.len(), seed_demo = cfg.seed_demo, "Loaded config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "quizbank", %path, error = %e, "Config unusable; using defaults");
      AppConfig::default()
    }
  }
}
