//! Configuration for the vitals daemon and its clients.
//!
//! Precedence, lowest to highest: built-in defaults, an optional TOML config
//! file, then `VITALS_*` environment variables. The `store_name` value must
//! be identical across every process that is meant to share one registry
//! table.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4242;
pub const DEFAULT_STORE_NAME: &str = "vitals-registry";
const DEFAULT_LOG: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value in {var}: {value:?}")]
    Env { var: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listening address for the daemon.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer secret for mutating endpoints. Absent or empty disables
    /// authentication.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Identifier of the process-shared store.
    #[serde(default = "default_store_name")]
    pub store_name: String,
    /// Overrides the shared-store base directory (mainly for tests).
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Default tracing filter, overridable per invocation.
    #[serde(default = "default_log")]
    pub log: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_owned()
}

fn default_log() -> String {
    DEFAULT_LOG.to_owned()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            store_name: default_store_name(),
            store_dir: None,
            log: default_log(),
        }
    }
}

impl AppConfig {
    /// Loads configuration: defaults, then `path` (or the per-user default
    /// location when it exists), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env()?;
        if config.api_key.as_deref() == Some("") {
            config.api_key = None;
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// `~/.config/vitals/config.toml` (platform equivalent).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vitals").join("config.toml"))
    }

    pub fn auth_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("VITALS_HOST") {
            self.host = host;
        }
        if let Ok(port) = env::var("VITALS_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::Env {
                var: "VITALS_PORT".into(),
                value: port.clone(),
            })?;
        }
        if let Ok(key) = env::var("VITALS_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(name) = env::var("VITALS_STORE_NAME") {
            self.store_name = name;
        }
        if let Ok(dir) = env::var("VITALS_STORE_DIR") {
            self.store_dir = Some(PathBuf::from(dir));
        }
        if let Ok(log) = env::var("VITALS_LOG") {
            self.log = log;
        }
        Ok(())
    }
}
