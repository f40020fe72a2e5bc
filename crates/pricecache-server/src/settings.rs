//! Server settings.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. Optional TOML file (`pricecache.toml`, or the path in `PRICECACHE_CONFIG`)
//! 3. Environment variables, `PRICECACHE__SECTION__KEY`
//!
//! Durations are humantime strings (`"250ms"`, `"30s"`, `"5m"`).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use pricecache_core::Backoff;
use pricecache_sync::ListenerConfig;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::gateway::{FallbackRegistry, GatewayConfig};

/// Environment variable naming the settings file.
pub const CONFIG_PATH_ENV: &str = "PRICECACHE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "pricecache.toml";
const ENV_PREFIX: &str = "PRICECACHE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("server.port must not be 0")]
    InvalidPort,

    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("gateway.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("{section}: max_backoff ({max:?}) must not be below initial_backoff ({initial:?})")]
    InvalidBackoff {
        section: &'static str,
        initial: Duration,
        max: Duration,
    },

    #[error("cache.sweep_interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("listener.channel must not be empty")]
    EmptyChannel,

    #[error("invalid fallback: {0}")]
    InvalidFallback(String),

    #[error("database.url is required")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub stale_ttl: Duration,
    /// 0 disables the bound.
    pub max_capacity: u64,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            stale_ttl: Duration::from_secs(3600),
            max_capacity: 10_000,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub recompute_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub fallback_ttl: Duration,
    /// Static value per projection kind (`test`, `test_group`).
    pub fallbacks: HashMap<String, Value>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            recompute_timeout: Duration::from_secs(2),
            fallback_ttl: Duration::from_secs(30),
            fallbacks: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    pub channel: String,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub watermark_path: PathBuf,
    pub batch_limit: usize,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            channel: "catalog_changes".to_string(),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            watermark_path: PathBuf::from("./data/watermark.json"),
            batch_limit: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarmUpSettings {
    pub on_startup: bool,
    /// Empty means every active price list.
    pub scope_ids: Vec<i64>,
}

impl Default for WarmUpSettings {
    fn default() -> Self {
        Self {
            on_startup: true,
            scope_ids: Vec::new(),
        }
    }
}

/// All server settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub gateway: GatewaySettings,
    pub listener: ListenerSettings,
    pub warmup: WarmUpSettings,
    pub log_format: LogFormat,
}

impl Settings {
    /// Loads settings from the default file location and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_with(Some(&path), Self::environment())
    }

    /// Loads settings from an optional file plus the given environment source.
    pub fn load_with(file: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The process environment, `PRICECACHE__` prefixed.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("warmup.scope_ids")
    }

    /// Checks values that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.server.port == 0 {
            return Err(SettingsError::InvalidPort);
        }
        if self.gateway.max_attempts == 0 {
            return Err(SettingsError::ZeroAttempts);
        }
        if self.gateway.max_backoff < self.gateway.initial_backoff {
            return Err(SettingsError::InvalidBackoff {
                section: "gateway",
                initial: self.gateway.initial_backoff,
                max: self.gateway.max_backoff,
            });
        }
        if self.listener.max_backoff < self.listener.initial_backoff {
            return Err(SettingsError::InvalidBackoff {
                section: "listener",
                initial: self.listener.initial_backoff,
                max: self.listener.max_backoff,
            });
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(SettingsError::ZeroSweepInterval);
        }
        if self.listener.channel.trim().is_empty() {
            return Err(SettingsError::EmptyChannel);
        }
        self.fallbacks()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, SettingsError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|_| SettingsError::InvalidAddress(addr))
    }

    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache.ttl,
            stale_ttl: self.cache.stale_ttl,
            max_capacity: (self.cache.max_capacity > 0).then_some(self.cache.max_capacity),
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_attempts: self.gateway.max_attempts,
            backoff: Backoff::new(self.gateway.initial_backoff, self.gateway.max_backoff),
            recompute_timeout: self.gateway.recompute_timeout,
            fallback_ttl: self.gateway.fallback_ttl,
        }
    }

    pub fn fallbacks(&self) -> Result<FallbackRegistry, SettingsError> {
        FallbackRegistry::from_config(&self.gateway.fallbacks)
            .map_err(|e| SettingsError::InvalidFallback(e.to_string()))
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            backoff: Backoff::new(self.listener.initial_backoff, self.listener.max_backoff),
            connect_timeout: self.listener.connect_timeout,
            batch_limit: self.listener.batch_limit.max(1),
        }
    }
}
