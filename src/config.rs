//! Shell Configuration
//!
//! Settings for reaching the backend, loaded from `shell.toml`.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Delay policy between reconnect attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed { delay_ms: u64 },
    /// Exponential backoff
    Exponential { initial_ms: u64, max_ms: u64, multiplier: f64 },
    /// Linear backoff
    Linear { initial_ms: u64, increment_ms: u64, max_ms: u64 },
}

impl BackoffStrategy {
    /// Delay before the given retry attempt (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = match *self {
            Self::Fixed { delay_ms } => delay_ms,
            Self::Exponential { initial_ms, max_ms, multiplier } => {
                let factor = multiplier.max(1.0).powi(attempt.min(64) as i32);
                ((initial_ms as f64) * factor).min(max_ms as f64) as u64
            }
            Self::Linear { initial_ms, increment_ms, max_ms } => initial_ms
                .saturating_add(increment_ms.saturating_mul(attempt as u64))
                .min(max_ms),
        };
        Duration::from_millis(ms)
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_ms: 200,
            max_ms: 5000,
            multiplier: 2.0,
        }
    }
}

/// Where the backend listens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7422,
        }
    }
}

impl BackendConfig {
    /// Base URL for plain HTTP calls
    pub fn http_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// URL of the push channel
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }
}

/// Transport tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Timeout for each HTTP request
    pub request_timeout_ms: u64,
    /// How long a streamed call waits for the server to announce a session id
    pub session_wait_ms: u64,
    /// Reconnect policy while streamed calls are pending
    pub reconnect: BackoffStrategy,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30000,
            session_wait_ms: 1000,
            reconnect: BackoffStrategy::default(),
        }
    }
}

impl TransportSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_wait(&self) -> Duration {
        Duration::from_millis(self.session_wait_ms)
    }
}

/// Complete shell configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub backend: BackendConfig,
    pub transport: TransportSettings,
}

impl ShellConfig {
    /// Default location: `<config dir>/ssui/shell.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ssui").join("shell.toml"))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text, path)?;
        info!("Loaded shell config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or the default location; missing files yield defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
