//! Application configuration with persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "MEDIA_CONTROL_CONFIG";

const CONFIG_DIR_NAME: &str = "media-control";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config file {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("Invalid configuration: {0}")]
  Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  /// Directory scanned for playable media.
  #[serde(default = "default_media_dir")]
  pub media_dir: PathBuf,

  /// Location of the mpv control socket (named pipe on Windows).
  #[serde(default = "default_socket_path")]
  pub socket_path: PathBuf,

  /// Custom MPV executable path (None = auto-detect).
  #[serde(default)]
  pub mpv_path: Option<String>,

  /// Additional MPV command-line arguments.
  #[serde(default)]
  pub mpv_args: Vec<String>,

  /// How long a player may take to exit after `quit` before it is killed.
  #[serde(default = "default_grace_period_ms")]
  pub grace_period_ms: u64,

  /// Upper bound for a single IPC exchange.
  #[serde(default = "default_ipc_timeout_ms")]
  pub ipc_timeout_ms: u64,

  /// How long `play` waits for a freshly spawned mpv to create its socket.
  #[serde(default = "default_socket_wait_ms")]
  pub socket_wait_ms: u64,

  /// Seek distance used when a seek command omits its seconds.
  #[serde(default = "default_seek_seconds")]
  pub seek_seconds: f64,
}

fn default_media_dir() -> PathBuf {
  let home = dirs::home_dir().unwrap_or_else(|| {
    log::warn!("No home directory found, media directory is relative to the working directory");
    PathBuf::new()
  });
  home.join("Media").join("MOVIES")
}

fn default_socket_path() -> PathBuf {
  #[cfg(windows)]
  {
    PathBuf::from(r"\\.\pipe\mpv-ipc-socket")
  }
  #[cfg(not(windows))]
  {
    std::env::temp_dir().join("mpv-ipc-socket")
  }
}

fn default_grace_period_ms() -> u64 {
  2000
}

fn default_ipc_timeout_ms() -> u64 {
  2000
}

fn default_socket_wait_ms() -> u64 {
  1000
}

fn default_seek_seconds() -> f64 {
  10.0
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      media_dir: default_media_dir(),
      socket_path: default_socket_path(),
      mpv_path: None,
      mpv_args: Vec::new(),
      grace_period_ms: default_grace_period_ms(),
      ipc_timeout_ms: default_ipc_timeout_ms(),
      socket_wait_ms: default_socket_wait_ms(),
      seek_seconds: default_seek_seconds(),
    }
  }
}

impl AppConfig {
  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.media_dir.as_os_str().is_empty() {
      return Err("Media directory cannot be empty".to_string());
    }
    if self.media_dir.is_relative() {
      return Err(format!(
        "Media directory must be an absolute path: {}",
        self.media_dir.display()
      ));
    }
    if self.socket_path.as_os_str().is_empty() {
      return Err("Socket path cannot be empty".to_string());
    }
    if self.ipc_timeout_ms == 0 || self.ipc_timeout_ms > 60_000 {
      return Err("IPC timeout must be between 1 and 60000 milliseconds".to_string());
    }
    if self.grace_period_ms > 60_000 {
      return Err("Grace period cannot exceed 60000 milliseconds".to_string());
    }
    if !self.seek_seconds.is_finite() || self.seek_seconds <= 0.0 {
      return Err("Default seek distance must be a positive number of seconds".to_string());
    }
    Ok(())
  }

  pub fn grace_period(&self) -> Duration {
    Duration::from_millis(self.grace_period_ms)
  }

  pub fn ipc_timeout(&self) -> Duration {
    Duration::from_millis(self.ipc_timeout_ms)
  }

  pub fn socket_wait(&self) -> Duration {
    Duration::from_millis(self.socket_wait_ms)
  }

  /// The configured mpv path, ignoring blank entries.
  pub fn mpv_path(&self) -> Option<PathBuf> {
    self
      .mpv_path
      .as_ref()
      .filter(|s| !s.trim().is_empty())
      .map(PathBuf::from)
  }

  /// Default config file location: `$MEDIA_CONTROL_CONFIG`, else the
  /// platform config dir.
  pub fn default_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
      return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
  }

  /// Read and validate a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let config: AppConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
  }

  /// Load from the default location. A missing file yields the defaults.
  pub fn load_or_default() -> Result<Self, ConfigError> {
    let Some(path) = Self::default_path() else {
      log::info!("No config directory available, using defaults");
      return Ok(Self::default());
    };

    if !path.exists() {
      log::info!("No config file at {:?}, using defaults", path);
      return Ok(Self::default());
    }

    log::info!("Loading config from {:?}", path);
    Self::load(&path)
  }
}
