//! Error types for pool and registry operations
//!
//! This module provides the error taxonomy for connection management:
//! dial failures, pool wait timeouts, closed pools, command failures, and
//! fatal startup errors.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while acquiring or using a pooled connection
#[derive(Debug)]
#[non_exhaustive]
pub enum PoolError {
    /// Opening a new connection to the store failed (network, auth or
    /// database selection)
    Dial {
        address: String,
        source: redis::RedisError,
    },

    /// The pool could not supply a connection before the caller's deadline
    WaitTimeout {
        pool: String,
        wait: Option<Duration>,
    },

    /// The pool was closed while the request was in flight
    Closed { pool: String },

    /// A command round trip on a checked-out connection failed
    Command { source: redis::RedisError },

    /// A pool failed to start; the process should not continue with an
    /// unreachable store
    Startup {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Unexpected failure inside the resource pool
    Internal { pool: String, message: String },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dial { address, source } => {
                write!(f, "failed to dial redis at {}: {}", address, source)
            }
            Self::WaitTimeout { pool, wait } => match wait {
                Some(wait) => write!(
                    f,
                    "pool '{}': no connection available within {:?}",
                    pool, wait
                ),
                None => write!(f, "pool '{}': wait for a connection timed out", pool),
            },
            Self::Closed { pool } => write!(f, "pool '{}' is closed", pool),
            Self::Command { source } => write!(f, "redis command failed: {}", source),
            Self::Startup { name, source } => {
                write!(f, "redis pool '{}' failed to start: {}", name, source)
            }
            Self::Internal { pool, message } => write!(f, "pool '{}': {}", pool, message),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dial { source, .. } | Self::Command { source } => Some(source),
            Self::Startup { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl PoolError {
    pub(crate) fn dial(address: impl Into<String>, source: redis::RedisError) -> Self {
        Self::Dial {
            address: address.into(),
            source,
        }
    }

    pub(crate) fn startup(
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Startup {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Check if this is a dial error
    #[must_use]
    pub const fn is_dial_error(&self) -> bool {
        matches!(self, Self::Dial { .. })
    }

    /// Check if this is a wait-timeout from the resource pool
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Check if this error is fatal: the configuration or deployment is
    /// wrong and the process should not proceed
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup { .. })
    }

    /// Get the appropriate log level for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Startup failures need attention before anything else runs
            Self::Startup { .. } | Self::Internal { .. } => tracing::Level::ERROR,
            // Dial and timeout errors might be transient
            Self::Dial { .. } | Self::WaitTimeout { .. } | Self::Closed { .. } => {
                tracing::Level::WARN
            }
            Self::Command { .. } => tracing::Level::WARN,
        }
    }
}

/// Errors in the configuration surface: unreadable files, bad TOML, or
/// values a pool cannot be built from
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    /// Address is not a usable `host:port` pair
    #[error("invalid redis address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Pool settings are unusable
    #[error("pool '{name}': {reason}")]
    InvalidPool { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn io_redis_error(kind: std::io::ErrorKind, msg: &str) -> redis::RedisError {
        redis::RedisError::from(std::io::Error::new(kind, msg.to_string()))
    }

    #[test]
    fn test_dial_error_display() {
        let err = PoolError::dial(
            "cache.example.com:6379",
            io_redis_error(std::io::ErrorKind::ConnectionRefused, "refused"),
        );

        let msg = err.to_string();
        assert!(msg.contains("cache.example.com:6379"));
        assert!(msg.contains("refused"));
        assert!(err.is_dial_error());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_wait_timeout_display() {
        let err = PoolError::WaitTimeout {
            pool: "cache1".to_string(),
            wait: Some(Duration::from_millis(250)),
        };

        let msg = err.to_string();
        assert!(msg.contains("cache1"));
        assert!(msg.contains("250"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_wait_timeout_without_deadline() {
        let err = PoolError::WaitTimeout {
            pool: "cache1".to_string(),
            wait: None,
        };

        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_closed_display() {
        let err = PoolError::Closed {
            pool: "sessions".to_string(),
        };

        assert_eq!(err.to_string(), "pool 'sessions' is closed");
    }

    #[test]
    fn test_startup_is_fatal() {
        let inner = PoolError::dial(
            "127.0.0.1:1",
            io_redis_error(std::io::ErrorKind::ConnectionRefused, "refused"),
        );
        let err = PoolError::startup("default", inner);

        assert!(err.is_fatal());
        assert!(err.to_string().contains("default"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_command_error_source() {
        let err = PoolError::Command {
            source: io_redis_error(std::io::ErrorKind::BrokenPipe, "broken pipe"),
        };

        assert!(err.source().is_some());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_log_level() {
        let startup = PoolError::startup(
            "default",
            PoolError::Closed {
                pool: "default".to_string(),
            },
        );
        assert_eq!(startup.log_level(), tracing::Level::ERROR);

        let timeout = PoolError::WaitTimeout {
            pool: "cache1".to_string(),
            wait: None,
        };
        assert_eq!(timeout.log_level(), tracing::Level::WARN);

        let dial = PoolError::dial(
            "127.0.0.1:6379",
            io_redis_error(std::io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(dial.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidAddress {
            address: "nowhere".to_string(),
            reason: "expected host:port".to_string(),
        };
        assert!(err.to_string().contains("nowhere"));
        assert!(err.to_string().contains("host:port"));

        let err = ConfigError::InvalidPool {
            name: "cache1".to_string(),
            reason: "database index must not be negative".to_string(),
        };
        assert!(err.to_string().contains("cache1"));
    }
}
