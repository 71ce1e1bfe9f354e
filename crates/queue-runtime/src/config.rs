//! Runtime configuration loaded from the process environment.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `REDIS_HOST` | broker host | `127.0.0.1` |
//! | `REDIS_PORT` | broker port | `6379` |
//! | `REDIS_PASSWORD` | `AUTH` password | none |
//! | `REDIS_DB` | database index | `0` |
//! | `SQ_POOL_SIZE` | broker connections per process | `8` |
//! | `SQ_BATCH_LIMIT` | entries per drain, `0` = all available | `0` |
//! | `SQ_BLOCK_MS` | broker-side wait on empty reads, `0` = no wait | `2000` |
//!
//! Topic and group are not configured here; the binaries take them as
//! command-line arguments.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use stream_queue::{ConsumerConfig, RespSettings, StartPosition, DEFAULT_POOL_SIZE};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but its value is unusable.
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the broker lives and how to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub password: Option<String>,
    pub database: u8,
    pub pool_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            connect_timeout: Duration::from_secs(10),
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl BrokerConfig {
    /// Connection settings for the RESP adapter.
    #[must_use]
    pub fn settings(&self) -> RespSettings {
        RespSettings {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            database: self.database,
            connect_timeout: self.connect_timeout,
            pool_size: self.pool_size,
        }
    }
}

/// Consumer loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Entries per drain; 0 means everything available.
    pub batch_limit: usize,
    /// Broker-side wait on an empty read.
    pub block: Option<Duration>,
    /// Client-side deadline on each read.
    pub read_timeout: Duration,
    /// Sleep after a read that returned nothing.
    pub idle_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            batch_limit: 0,
            block: Some(Duration::from_millis(2000)),
            read_timeout: Duration::from_secs(30),
            idle_backoff: Duration::from_millis(500),
        }
    }
}

impl ConsumerSettings {
    /// Core consumer configuration. Groups created by the consumer start at
    /// new entries only.
    #[must_use]
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            start: StartPosition::NewOnly,
            block: self.block,
            read_timeout: Some(self.read_timeout),
        }
    }
}

/// Everything the binaries need besides topic and group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub broker: BrokerConfig,
    pub consumer: ConsumerSettings,
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from any variable source. Unset variables keep their defaults;
    /// set but unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("REDIS_HOST") {
            if host.trim().is_empty() {
                return Err(invalid("REDIS_HOST", host, "empty host"));
            }
            config.broker.host = host;
        }
        if let Some(raw) = lookup("REDIS_PORT") {
            let port: u16 = parse("REDIS_PORT", raw.clone())?;
            if port == 0 {
                return Err(invalid("REDIS_PORT", raw, "port 0"));
            }
            config.broker.port = port;
        }
        config.broker.password = lookup("REDIS_PASSWORD").filter(|p| !p.is_empty());
        if let Some(raw) = lookup("REDIS_DB") {
            config.broker.database = parse("REDIS_DB", raw)?;
        }
        if let Some(raw) = lookup("SQ_POOL_SIZE") {
            let size: usize = parse("SQ_POOL_SIZE", raw.clone())?;
            if size == 0 {
                return Err(invalid("SQ_POOL_SIZE", raw, "needs at least one connection"));
            }
            config.broker.pool_size = size;
        }

        if let Some(raw) = lookup("SQ_BATCH_LIMIT") {
            config.consumer.batch_limit = parse("SQ_BATCH_LIMIT", raw)?;
        }
        if let Some(raw) = lookup("SQ_BLOCK_MS") {
            let ms: u64 = parse("SQ_BLOCK_MS", raw.clone())?;
            let block = Duration::from_millis(ms);
            if block >= config.consumer.read_timeout {
                return Err(invalid("SQ_BLOCK_MS", raw, "must be below the read timeout"));
            }
            config.consumer.block = (ms > 0).then_some(block);
        }

        Ok(config)
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let parsed = raw.trim().parse::<T>();
    parsed.map_err(|e| invalid(var, raw, e.to_string()))
}

fn invalid(var: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value,
        reason: reason.into(),
    }
}
