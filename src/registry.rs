//! Named-instance registry and bootstrap
//!
//! One registry maps instance names to pool instances, with a distinguished
//! default entry. It is populated during process startup and read for the
//! rest of the process; lookups of unknown names are configuration mistakes
//! and fail fast.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tracing::info;

use crate::config::{Config, RedisConfig};
use crate::error::PoolError;
use crate::pool::{DeadpoolRedisPool, RedisPool};

/// Reserved name of the default pool instance
pub const DEFAULT_POOL: &str = "default";

/// Process-wide mapping from instance name to pool.
///
/// Construct one at the composition root and pass it where pools are
/// needed; there is no implicit global. Concurrent reads are safe alongside
/// the occasional concurrent registration, with no external locking.
///
/// ```no_run
/// use redis_pool::{RedisConfig, RedisPool, Registry};
///
/// # async fn demo() -> Result<(), redis_pool::PoolError> {
/// let registry = Registry::new();
/// registry
///     .install("cache1", RedisConfig::new("10.0.0.5:6379"))
///     .await?;
///
/// let pool = registry.resolve(Some("cache1"));
/// let mut conn = pool.get(None).await?;
/// conn.ping().await?;
/// pool.put(conn);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    pools: DashMap<String, Arc<dyn RedisPool>>,
    default_pool: RwLock<Option<Arc<dyn RedisPool>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under `name`. Registering an existing name replaces
    /// its entry; registering under [`DEFAULT_POOL`] also updates the
    /// default reference.
    pub fn register(&self, name: &str, pool: Arc<dyn RedisPool>) {
        if name == DEFAULT_POOL {
            *self
                .default_pool
                .write()
                .expect("registry lock poisoned") = Some(Arc::clone(&pool));
        }
        self.pools.insert(name.to_string(), pool);
    }

    /// Look up a pool by name; `None` means the default pool.
    ///
    /// An unknown name is a deployment or programming mistake, not a
    /// runtime condition; use [`try_resolve`](Self::try_resolve) for
    /// callers that can degrade.
    ///
    /// # Panics
    ///
    /// Panics when the name (or the default) was never configured.
    #[must_use]
    pub fn resolve(&self, name: Option<&str>) -> Arc<dyn RedisPool> {
        let wanted = name.unwrap_or(DEFAULT_POOL);
        self.try_resolve(name).unwrap_or_else(|| {
            panic!("unknown redis pool '{}' (forgotten to configure?)", wanted)
        })
    }

    /// Non-panicking lookup; `None` means the default pool
    #[must_use]
    pub fn try_resolve(&self, name: Option<&str>) -> Option<Arc<dyn RedisPool>> {
        match name {
            None | Some(DEFAULT_POOL) => self
                .default_pool
                .read()
                .expect("registry lock poisoned")
                .clone(),
            Some(name) => self.pools.get(name).map(|entry| Arc::clone(entry.value())),
        }
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Names of all registered pools
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Build a pool from `config`, prewarm it, probe it, and register it.
    ///
    /// Construction is eager and the probe is a PING round trip, so an
    /// unreachable or misconfigured store fails here, at startup, rather
    /// than on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Startup`] when the pool cannot be built or the
    /// probe fails. Callers should treat this as fatal.
    pub async fn install(&self, name: &str, config: RedisConfig) -> Result<(), PoolError> {
        let pool =
            DeadpoolRedisPool::new(name, config).map_err(|err| PoolError::startup(name, err))?;
        pool.prewarm().await;
        self.install_pool(name, Arc::new(pool)).await
    }

    /// Probe `pool` with one PING round trip and register it under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Startup`] when the probe fails; the pool is
    /// closed and nothing is registered.
    pub async fn install_pool(
        &self,
        name: &str,
        pool: Arc<dyn RedisPool>,
    ) -> Result<(), PoolError> {
        let mut conn = match pool.get(None).await {
            Ok(conn) => conn,
            Err(err) => {
                pool.close();
                return Err(PoolError::startup(name, err));
            }
        };

        if let Err(err) = conn.ping().await {
            conn.detach().close();
            pool.close();
            return Err(PoolError::startup(name, err));
        }

        pool.put(conn);
        self.register(name, pool);
        info!("redis pool '{}' is ready", name);
        Ok(())
    }

    /// Install every configured instance, failing fast on the first error
    ///
    /// # Errors
    ///
    /// Returns the first [`PoolError::Startup`] encountered.
    pub async fn install_all(&self, config: &Config) -> Result<(), PoolError> {
        for (name, instance) in &config.pools {
            self.install(name, instance.clone()).await?;
        }
        Ok(())
    }

    /// Close every registered pool. Entries stay registered; a later `get`
    /// against one rebuilds its resource pool on demand.
    pub fn close_all(&self) {
        for entry in self.pools.iter() {
            entry.value().close();
        }
        info!("closed {} redis pool(s)", self.pools.len());
    }
}
