//! Configuration validation and normalization

use tracing::{debug, warn};

use super::types::{Config, RedisConfig};
use crate::error::ConfigError;

/// Split a `host:port` address.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), ConfigError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidAddress {
            address: address.to_string(),
            reason: "expected host:port".to_string(),
        })?;

    if host.is_empty() {
        return Err(ConfigError::InvalidAddress {
            address: address.to_string(),
            reason: "host is empty".to_string(),
        });
    }

    let port: u16 = port.parse().map_err(|_| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason: format!("invalid port '{}'", port),
    })?;

    Ok((host.to_string(), port))
}

/// Validate every configured pool instance.
pub(crate) fn validate(config: &Config) -> Result<(), ConfigError> {
    for (name, pool) in &config.pools {
        validate_pool(name, pool)?;
    }
    Ok(())
}

/// Validate a single pool instance's settings.
pub(crate) fn validate_pool(name: &str, config: &RedisConfig) -> Result<(), ConfigError> {
    parse_address(&config.address)?;

    if config.database < 0 {
        return Err(ConfigError::InvalidPool {
            name: name.to_string(),
            reason: format!("database index {} must not be negative", config.database),
        });
    }

    if config.pool.size == 0 && config.pool.limit == 0 {
        return Err(ConfigError::InvalidPool {
            name: name.to_string(),
            reason: "pool size and limit are both zero".to_string(),
        });
    }

    Ok(())
}

/// Enforce `limit >= size`, raising the limit when a configuration violates
/// it. A limit left at zero means "same as size" and is raised quietly; an
/// explicit nonzero limit below size gets a diagnostic.
pub(crate) fn clamp_pool_limits(name: &str, config: &mut RedisConfig) {
    if config.pool.limit >= config.pool.size {
        return;
    }
    if config.pool.limit != 0 {
        warn!(
            "pool '{}': limit {} is below size {}, raising limit to {}",
            name, config.pool.limit, config.pool.size, config.pool.size
        );
    } else {
        debug!("pool '{}': limit not set, using size {}", name, config.pool.size);
    }
    config.pool.limit = config.pool.size;
}
