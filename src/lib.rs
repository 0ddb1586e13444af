//! Named registry of pooled Redis connections.
//!
//! Each named instance owns a bounded pool of long-lived, authenticated
//! connections to one store. The crate's job is the policy around the
//! generic resource pool: refusing to hand out connections that previously
//! failed (they are swapped for freshly dialed ones at checkout), rebuilding
//! a closed pool on demand, and keeping the name→pool registry safe for
//! concurrent use from startup onward.
//!
//! ```no_run
//! use std::time::Duration;
//! use redis_pool::{RedisConfig, RedisPool, Registry};
//!
//! # async fn demo() -> Result<(), redis_pool::PoolError> {
//! let registry = Registry::new();
//! registry
//!     .install("default", RedisConfig::new("127.0.0.1:6379"))
//!     .await?;
//!
//! let pool = registry.resolve(None);
//! let mut conn = pool.get(Some(Duration::from_secs(5))).await?;
//! conn.ping().await?;
//! pool.put(conn);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conn;
pub mod dial;
pub mod error;
pub mod logging;
pub mod mock;
pub mod pool;
pub mod registry;

pub use config::{Config, PoolConfig, RedisConfig, RedisConfigBuilder, load_config};
pub use conn::RedisConn;
pub use dial::{Dial, RedisDialer};
pub use error::{ConfigError, PoolError};
pub use pool::{DeadpoolRedisPool, PoolStatus, PooledConn, RedisPool};
pub use registry::{DEFAULT_POOL, Registry};
