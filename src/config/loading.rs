//! Configuration loading from files and the environment

use std::collections::HashMap;
use std::path::Path;

use super::types::{Config, RedisConfig};
use super::validation;
use crate::error::ConfigError;
use crate::registry::DEFAULT_POOL;

const ENV_ADDRESS: &str = "REDIS_ADDRESS";
const ENV_PASSWORD: &str = "REDIS_PASSWORD";
const ENV_DATABASE: &str = "REDIS_DATABASE";

/// Load and validate configuration from a TOML file
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or when a
/// configured instance fails validation.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;

    let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;

    validation::validate(&config)?;
    Ok(config)
}

/// Check whether the environment carries enough to configure a default pool
#[must_use]
pub fn has_env_config() -> bool {
    std::env::var(ENV_ADDRESS).is_ok()
}

/// Build a single-instance configuration from `REDIS_ADDRESS`,
/// `REDIS_PASSWORD` and `REDIS_DATABASE`
///
/// # Errors
///
/// Returns [`ConfigError`] when the address is missing or any value fails
/// validation.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    config_from_lookup(|key| std::env::var(key).ok())
}

/// Load from a file when it exists, otherwise fall back to the environment
///
/// # Errors
///
/// Returns [`ConfigError::Read`] when neither source is available.
pub fn load_config_with_fallback(path: &str) -> Result<Config, ConfigError> {
    if Path::new(path).exists() {
        return load_config(path);
    }
    if has_env_config() {
        return load_config_from_env();
    }
    Err(ConfigError::Read {
        path: path.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no config file and no REDIS_ADDRESS in the environment",
        ),
    })
}

/// Environment lookup is injected so tests stay off the process environment.
fn config_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let address = lookup(ENV_ADDRESS).ok_or_else(|| ConfigError::InvalidAddress {
        address: String::new(),
        reason: format!("{} is not set", ENV_ADDRESS),
    })?;

    let mut instance = RedisConfig::new(address);
    instance.password = lookup(ENV_PASSWORD);
    if let Some(database) = lookup(ENV_DATABASE) {
        instance.database = database.parse().map_err(|_| ConfigError::InvalidPool {
            name: DEFAULT_POOL.to_string(),
            reason: format!("{} '{}' is not an integer", ENV_DATABASE, database),
        })?;
    }

    let mut pools = HashMap::new();
    pools.insert(DEFAULT_POOL.to_string(), instance);
    let config = Config { pools };

    validation::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_file() {
        let toml_input = r#"
            [pools.default]
            address = "127.0.0.1:6379"

            [pools.cache1]
            address = "10.0.0.5:6379"
            database = 2

            [pools.cache1.pool]
            size = 2
            limit = 5
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_input).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.pools.len(), 2);
        assert_eq!(config.pools["cache1"].database, 2);
        assert_eq!(config.pools["cache1"].pool.limit, 5);
    }

    #[test]
    fn test_load_config_nonexistent_file() {
        let result = load_config("/nonexistent/path/redis.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "invalid toml content [[[").unwrap();

        let result = load_config(temp_file.path().to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_config_rejects_invalid_instance() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[pools.default]\naddress = \"no-port\"\n").unwrap();

        let result = load_config(temp_file.path().to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::InvalidAddress { .. })));
    }

    #[test]
    fn test_env_config_full() {
        let vars: HashMap<&str, &str> = [
            (ENV_ADDRESS, "127.0.0.1:6379"),
            (ENV_PASSWORD, "secret"),
            (ENV_DATABASE, "3"),
        ]
        .into_iter()
        .collect();

        let config = config_from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        let instance = &config.pools[DEFAULT_POOL];
        assert_eq!(instance.address, "127.0.0.1:6379");
        assert_eq!(instance.password.as_deref(), Some("secret"));
        assert_eq!(instance.database, 3);
    }

    #[test]
    fn test_env_config_missing_address() {
        let result = config_from_lookup(|_| None);
        assert!(matches!(result, Err(ConfigError::InvalidAddress { .. })));
    }

    #[test]
    fn test_env_config_bad_database() {
        let vars: HashMap<&str, &str> = [(ENV_ADDRESS, "127.0.0.1:6379"), (ENV_DATABASE, "two")]
            .into_iter()
            .collect();

        let result = config_from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidPool { .. })));
    }
}
