//! Configuration types and loading
//!
//! The config file path comes from `--config`, then `CONFIG_PATH`, then
//! `cineprompt.toml`. Every field falls back to its default when the file or
//! the field is absent. API keys are the only values read from the
//! environment: GEMINI_API_KEYS (or API_KEY) as a comma-separated list,
//! never stored in the TOML.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables holding the comma-separated key list, in lookup order.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEYS", "API_KEY"];

/// Added on top of the longest possible generation when draining.
const DRAIN_SLACK: Duration = Duration::from_secs(5);

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Raw comma-separated key list from the environment
    #[serde(skip)]
    pub api_keys: Option<Secret<String>>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Generation provider settings
#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Local state files
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_max_connections() -> usize {
    64
}

fn default_endpoint() -> String {
    generation::DEFAULT_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_history_limit() -> usize {
    50
}

impl Config {
    /// Load configuration from a TOML file and pick up the API key list from
    /// the environment.
    ///
    /// A missing file is not an error: every field has a default, so the
    /// service can run from environment variables alone.
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config: Config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.validate()?;
        config.api_keys = api_keys_from_env();
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.gemini.endpoint.starts_with("http://")
            && !self.gemini.endpoint.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "gemini.endpoint must start with http:// or https://, got: {}",
                self.gemini.endpoint
            )));
        }

        if self.gemini.timeout_secs == 0 {
            return Err(common::Error::Config(
                "gemini.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }

        if self.storage.history_limit == 0 {
            return Err(common::Error::Config(
                "storage.history_limit must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("cineprompt.toml")
    }

    /// How long shutdown waits for in-flight requests: one generation that
    /// times out on every key, plus slack.
    pub fn drain_timeout(&self, total_keys: usize) -> Duration {
        let per_key = self.gemini.timeout_secs;
        Duration::from_secs(per_key.saturating_mul(total_keys.max(1) as u64)) + DRAIN_SLACK
    }

    pub fn history_path(&self) -> PathBuf {
        self.storage.data_dir.join("history.json")
    }

    pub fn keys_path(&self) -> PathBuf {
        self.storage.data_dir.join("keys.json")
    }
}

/// First non-blank value among `API_KEY_ENV_VARS`.
fn api_keys_from_env() -> Option<Secret<String>> {
    API_KEY_ENV_VARS.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Secret::new)
    })
}
