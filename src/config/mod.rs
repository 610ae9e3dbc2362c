use std::collections::HashMap;
use std::env;
use std::fs;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::limiter::window::ResetBoundary;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't open \"{path}\": {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("couldn't substitute environment variables: {0}")]
    Substitute(String),
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing [{0}] section for the selected backend")]
    MissingSection(&'static str),
    #[error("rate_limit.daily_quota must be at least 1")]
    EmptyQuota,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub mongo: Option<MongoConfig>,
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    pub sentry: Option<SentryConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServiceConfig {
    pub store: StoreBackend,
    pub cache: CacheBackend,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Mongo,
            cache: CacheBackend::Redis,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub bind_port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MongoConfig {
    pub string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_name: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub password: Option<String>,
}

/// Daily quota settings applied by the rate limiter middleware.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub daily_quota: u32,
    pub reset: ResetBoundary,
    pub header: String,
    pub key_prefix: String,
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_quota: 3,
            reset: ResetBoundary::Local,
            header: "user_id".into(),
            key_prefix: "rate_limit:".into(),
            fail_open: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SentryConfig {
    pub dsn: String,
}

impl Config {
    pub fn new<S: AsRef<str>>(path: S) -> Result<Self, ConfigError> {
        let configuration =
            fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
                path: path.as_ref().into(),
                source,
            })?;

        info!("\"{}\" loaded correctly.", path.as_ref());

        // envsubst refuses keys and values containing its own delimiters
        let variables: HashMap<String, String> = env::vars()
            .filter(|(key, value)| !Self::has_delimiters(key) && !Self::has_delimiters(value))
            .collect();
        let configuration = envsubst::substitute(configuration, &variables)
            .map_err(|e| ConfigError::Substitute(e.to_string()))?;

        Self::parse(&configuration)
    }

    pub fn parse(configuration: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(configuration)?;

        if config.service.store == StoreBackend::Mongo && config.mongo.is_none() {
            return Err(ConfigError::MissingSection("mongo"));
        }

        if config.service.cache == CacheBackend::Redis && config.redis.is_none() {
            return Err(ConfigError::MissingSection("redis"));
        }

        if config.rate_limit.daily_quota == 0 {
            return Err(ConfigError::EmptyQuota);
        }

        Ok(config)
    }

    fn has_delimiters(text: &str) -> bool {
        text.contains(|c| c == '$' || c == '{' || c == '}')
    }
}
