use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::DEFAULT_POLL_INTERVAL;

/// Environment variable that overrides `server.url`
const SERVER_URL_ENV: &str = "FEEDSYNC_SERVER_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub url: String,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub poll_interval_secs: u64,
  /// Keep polled posts out of the feed until they are revealed
  pub hide_new_posts: bool,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
      hide_new_posts: false,
    }
  }
}

impl SyncConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Database file (defaults to $XDG_DATA_HOME/feedsync/cache.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// `EnvFilter` directive; `RUST_LOG` takes precedence
  pub level: String,
  /// Also write logs to this file
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./feedsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/feedsync/config.yaml
  ///
  /// Without any file, `FEEDSYNC_SERVER_URL` alone is enough to run with
  /// defaults. When set, it always wins over `server.url`.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let env_url = std::env::var(SERVER_URL_ENV).ok();

    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match (path, env_url.clone()) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(url)) => Self::with_server_url(url),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/feedsync/config.yaml\n\
                 or set {}.",
          SERVER_URL_ENV
        ))
      }
    };

    Ok(config.override_server_url(env_url))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("feedsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("feedsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn with_server_url(url: String) -> Self {
    Self {
      server: ServerConfig {
        url,
        timeout_secs: default_timeout_secs(),
      },
      sync: SyncConfig::default(),
      cache: CacheConfig::default(),
      log: LogConfig::default(),
    }
  }

  fn override_server_url(mut self, url: Option<String>) -> Self {
    if let Some(url) = url {
      self.server.url = url;
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config: Config = serde_yaml::from_str("server:\n  url: http://localhost:9999\n").unwrap();

    assert_eq!(config.server.url, "http://localhost:9999");
    assert_eq!(config.server.timeout_secs, 30);
    assert_eq!(config.sync.poll_interval(), Duration::from_secs(10));
    assert!(!config.sync.hide_new_posts);
    assert!(config.cache.path.is_none());
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
server:
  url: https://posts.example.org
  timeout_secs: 5
sync:
  poll_interval_secs: 30
  hide_new_posts: true
cache:
  path: /tmp/feed.db
log:
  level: feedsync=debug
  file: /tmp/feedsync.log
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(config.server.timeout_secs, 5);
    assert_eq!(config.sync.poll_interval(), Duration::from_secs(30));
    assert!(config.sync.hide_new_posts);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/feed.db")));
    assert_eq!(config.log.file, Some(PathBuf::from("/tmp/feedsync.log")));
  }

  #[test]
  fn test_missing_server_is_rejected() {
    assert!(serde_yaml::from_str::<Config>("sync:\n  hide_new_posts: true\n").is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedsync.yaml");
    std::fs::write(&path, "server:\n  url: http://localhost:9999\n").unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.server.url, "http://localhost:9999");
  }

  #[test]
  fn test_explicit_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }

  #[test]
  fn test_server_url_override() {
    let config = Config::with_server_url("http://a".to_string())
      .override_server_url(Some("http://b".to_string()));
    assert_eq!(config.server.url, "http://b");

    let config = config.override_server_url(None);
    assert_eq!(config.server.url, "http://b");
  }
}
