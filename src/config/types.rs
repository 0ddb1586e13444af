//! Configuration types for named pool instances

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;
use super::duration::duration_secs;

/// Top-level configuration: one entry per named pool instance.
///
/// ```toml
/// [pools.default]
/// address = "127.0.0.1:6379"
///
/// [pools.cache1]
/// address = "10.0.0.5:6379"
/// database = 2
///
/// [pools.cache1.pool]
/// size = 4
/// limit = 16
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub pools: HashMap<String, RedisConfig>,
}

/// Settings for one pool instance. Immutable once the pool is built.
///
/// Timeouts are expressed in whole seconds in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisConfig {
    /// Store address as `host:port`
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database index selected after connecting
    #[serde(default)]
    pub database: i64,

    #[serde(default = "defaults::connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,

    #[serde(default = "defaults::read_timeout", with = "duration_secs")]
    pub read_timeout: Duration,

    #[serde(default = "defaults::write_timeout", with = "duration_secs")]
    pub write_timeout: Duration,

    #[serde(default)]
    pub pool: PoolConfig,
}

/// Sizing for the underlying resource pool.
///
/// Invariant: `limit >= size`. A configured limit below `size` is raised to
/// `size` when the pool is built; leaving `limit` at zero means "same as
/// size".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Target number of connections the pool is prefilled toward
    #[serde(default = "defaults::pool_size")]
    pub size: usize,

    /// Hard cap on concurrently live connections
    #[serde(default)]
    pub limit: usize,

    /// Idle connections older than this are evicted; zero disables eviction
    #[serde(default = "defaults::idle_timeout", with = "duration_secs")]
    pub idle_timeout: Duration,

    /// Number of connections opened ahead of first use
    #[serde(default)]
    pub prefill: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: defaults::pool_size(),
            limit: 0,
            idle_timeout: defaults::idle_timeout(),
            prefill: 0,
        }
    }
}

impl RedisConfig {
    /// Configuration for `address` with default timeouts and pool sizing
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: None,
            database: 0,
            connect_timeout: defaults::connect_timeout(),
            read_timeout: defaults::read_timeout(),
            write_timeout: defaults::write_timeout(),
            pool: PoolConfig::default(),
        }
    }

    /// Create a builder for constructing a configuration
    ///
    /// ```
    /// use std::time::Duration;
    /// use redis_pool::RedisConfig;
    ///
    /// let config = RedisConfig::builder("127.0.0.1:6379")
    ///     .database(3)
    ///     .connect_timeout(Duration::from_secs(2))
    ///     .pool_size(4)
    ///     .pool_limit(16)
    ///     .build();
    ///
    /// assert_eq!(config.database, 3);
    /// assert_eq!(config.pool.limit, 16);
    /// ```
    #[must_use]
    pub fn builder(address: impl Into<String>) -> RedisConfigBuilder {
        RedisConfigBuilder {
            config: Self::new(address),
        }
    }
}

/// Builder for [`RedisConfig`]
pub struct RedisConfigBuilder {
    config: RedisConfig,
}

impl RedisConfigBuilder {
    /// Set the password used to authenticate
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the database index selected after connecting
    #[must_use]
    pub fn database(mut self, database: i64) -> Self {
        self.config.database = database;
        self
    }

    /// Set the connection-establishment timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read half of the per-round-trip deadline
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the write half of the per-round-trip deadline
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the pool's prefill target
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool.size = size;
        self
    }

    /// Set the hard cap on concurrently live connections
    #[must_use]
    pub fn pool_limit(mut self, limit: usize) -> Self {
        self.config.pool.limit = limit;
        self
    }

    /// Set the idle eviction timeout (zero disables eviction)
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool.idle_timeout = timeout;
        self
    }

    /// Set the number of connections opened ahead of first use
    #[must_use]
    pub fn prefill(mut self, prefill: usize) -> Self {
        self.config.pool.prefill = prefill;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> RedisConfig {
        self.config
    }
}
