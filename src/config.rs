//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;
use crate::Result;
use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the chat-room server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Path of the refresh endpoint, relative to `server_url`
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Route shown after the session terminally expires
    #[serde(default = "default_login_route")]
    pub login_route: String,

    /// Renew the access credential when fewer seconds than this remain
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: i64,

    /// Keep credentials in the durable backend across restarts
    #[serde(default = "default_remember_me")]
    pub remember_me: bool,

    /// Directory holding the durable credential file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_refresh_path() -> String {
    "api/user/refresh-token".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_refresh_threshold_secs() -> i64 {
    600
}

fn default_remember_me() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    config_dir()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            refresh_path: default_refresh_path(),
            login_route: default_login_route(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
            remember_me: default_remember_me(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Resolve an API path against the configured server URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.server_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid server URL {}: {}", self.server_url, e)))?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("Invalid endpoint path {}: {}", path, e)))
    }

    /// Full URL of the refresh endpoint
    pub fn refresh_url(&self) -> Result<Url> {
        self.endpoint(&self.refresh_path)
    }

    /// Location of the durable credential file
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chatroom")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file, falling back to defaults when none exists
pub fn load() -> Result<Config> {
    let path = config_path();

    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}
