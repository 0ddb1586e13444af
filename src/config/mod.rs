//! Configuration module
//!
//! Configuration types, defaults, loading and validation for named pool
//! instances.

mod defaults;
mod duration;
mod loading;
mod types;

pub(crate) mod validation;

// Re-export public types
pub use loading::{has_env_config, load_config, load_config_from_env, load_config_with_fallback};
pub use types::{Config, PoolConfig, RedisConfig, RedisConfigBuilder};
