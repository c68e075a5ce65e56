//! Client configuration.
//!
//! Configuration is read from `~/.config/shopdesk/config.toml` (or the file
//! named by `SHOPDESK_CONFIG`). Every field has a default, so a missing file
//! or a partial file is fine. A few values can be overridden from the
//! environment, which is how the console's build used to inject endpoints.

use crate::error::{Result, ShopError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "SHOPDESK_CONFIG";
pub const API_URL_ENV: &str = "SHOPDESK_API_URL";
pub const WS_URL_ENV: &str = "SHOPDESK_WS_URL";
pub const USER_IDLE_MAX_ENV: &str = "SHOPDESK_USER_IDLE_MAX";

const APP_DIR: &str = "shopdesk";

/// Kinds of user input the idle watchdog can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    PointerDown,
    KeyDown,
    Wheel,
    TouchStart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API; request paths (`/apis/...`) are appended.
    pub api_url: String,
    /// Base URL of the websocket server; `/ws/<username>` is appended.
    pub ws_url: String,
    pub request_timeout_secs: u64,
    /// Where the authenticated session is persisted between runs.
    pub session_file: Option<PathBuf>,
    pub idle: IdleConfig,
    pub presence: PresenceConfig,
    pub notify: NotifyConfig,
    pub router: RouterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub user_idle_max_secs: u64,
    pub tick_ms: u64,
    pub qualifying_inputs: Vec<InputKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Number of notifications shown at once; 0 shows all.
    pub max_count: usize,
    pub display_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub guard_poll_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000".to_string(),
            request_timeout_secs: 30,
            session_file: None,
            idle: IdleConfig::default(),
            presence: PresenceConfig::default(),
            notify: NotifyConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            user_idle_max_secs: 600, // 10 minutes
            tick_ms: 1000,
            qualifying_inputs: vec![InputKind::PointerDown],
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 3000,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_count: 0,
            display_secs: 5,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { guard_poll_ms: 10 }
    }
}

impl IdleConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn qualifies(&self, kind: InputKind) -> bool {
        self.qualifying_inputs.contains(&kind)
    }
}

impl PresenceConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl RouterConfig {
    pub fn guard_poll(&self) -> Duration {
        Duration::from_millis(self.guard_poll_ms)
    }
}

impl ClientConfig {
    /// Loads configuration from the default location, then applies
    /// environment overrides and validates the result.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "[Config] No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "[Config] Loaded config file");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolves the config file path: `$SHOPDESK_CONFIG`, otherwise
    /// `<config_dir>/shopdesk/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("config.toml"))
            .ok_or_else(|| ShopError::config("Could not determine config directory"))
    }

    /// Path of the persisted session file.
    pub fn session_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }

        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("session.toml"))
            .ok_or_else(|| ShopError::config("Could not determine data directory"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var(API_URL_ENV) {
            self.api_url = url;
        }
        if let Ok(url) = env::var(WS_URL_ENV) {
            self.ws_url = url;
        }
        if let Ok(value) = env::var(USER_IDLE_MAX_ENV) {
            self.idle.user_idle_max_secs = value.parse().map_err(|_| {
                ShopError::config(format!("{USER_IDLE_MAX_ENV} must be a number, got '{value}'"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(ShopError::config("api_url cannot be empty"));
        }
        if self.ws_url.trim().is_empty() {
            return Err(ShopError::config("ws_url cannot be empty"));
        }
        if self.idle.user_idle_max_secs == 0 {
            return Err(ShopError::config("idle.user_idle_max_secs must be positive"));
        }
        if self.idle.tick_ms == 0 {
            return Err(ShopError::config("idle.tick_ms must be positive"));
        }
        if self.presence.retry_delay_ms == 0 {
            return Err(ShopError::config("presence.retry_delay_ms must be positive"));
        }
        if self.idle.qualifying_inputs.is_empty() {
            tracing::warn!("[Config] No qualifying inputs configured; idle timer can never be reset");
        }
        Ok(())
    }
}
