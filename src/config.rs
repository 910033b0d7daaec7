use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Buffered change notifications per subscriber before it lags
    pub channel_capacity: usize,
    /// Fixed polling fallback used by messaging views
    pub message_poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/school_ideas.db".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            cache: CacheConfig { capacity: 1000 },
            realtime: RealtimeConfig {
                channel_capacity: 256,
                message_poll_interval_ms: 3000,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        let config = Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            cache: CacheConfig {
                capacity: parse_var("CACHE_CAPACITY", defaults.cache.capacity)?,
            },
            realtime: RealtimeConfig {
                channel_capacity: parse_var(
                    "CHANGE_FEED_CAPACITY",
                    defaults.realtime.channel_capacity,
                )?,
                message_poll_interval_ms: parse_var(
                    "MESSAGE_POLL_INTERVAL_MS",
                    defaults.realtime.message_poll_interval_ms,
                )?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.cache.capacity == 0 {
            return Err(AppError::ConfigurationError(
                "CACHE_CAPACITY must be greater than zero".to_string(),
            ));
        }
        if self.realtime.channel_capacity == 0 {
            return Err(AppError::ConfigurationError(
                "CHANGE_FEED_CAPACITY must be greater than zero".to_string(),
            ));
        }
        if !(2000..=5000).contains(&self.realtime.message_poll_interval_ms) {
            return Err(AppError::ConfigurationError(format!(
                "MESSAGE_POLL_INTERVAL_MS must be between 2000 and 5000, got {}",
                self.realtime.message_poll_interval_ms
            )));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn message_poll_interval(&self) -> Duration {
        Duration::from_millis(self.realtime.message_poll_interval_ms)
    }

    /// File path behind a `sqlite:` url, `None` for in-memory databases.
    pub fn database_file(&self) -> Option<&Path> {
        let url = self.database.url.as_str();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.starts_with(':') {
            return None;
        }
        Some(Path::new(path))
    }

    /// SQLite creates the database file but not its parent directory.
    pub fn prepare_database_dir(&self) -> AppResult<()> {
        let Some(parent) = self.database_file().and_then(Path::parent) else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::ConfigurationError(format!(
                "Cannot create database directory {}: {}",
                parent.display(),
                e
            ))
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigurationError(format!("{} has an invalid value: {:?}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}
