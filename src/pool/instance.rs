//! Production pool instance
//!
//! `DeadpoolRedisPool` owns one generic resource pool plus the policy around
//! it:
//! - reconnect-on-checkout: a connection with a recorded failure is never
//!   handed to a caller; it is swapped for a freshly dialed one in place
//! - lazy reinitialization: a closed pool is rebuilt on demand behind a
//!   write lock, with the check repeated under the lock
//! - prewarming toward the configured prefill target
//! - idle eviction on the configured idle timeout

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use deadpool::Runtime;
use deadpool::managed;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::manager::{Pool, RedisManager};
use super::{PoolStatus, PooledConn, RedisPool};
use crate::config::RedisConfig;
use crate::config::validation;
use crate::dial::{Dial, RedisDialer};
use crate::error::{ConfigError, PoolError};

/// One named pool of connections to a single store.
///
/// The underlying resource pool may be replaced any number of times over the
/// process lifetime (a later `get` against a closed pool rebuilds it); the
/// instance itself lives as long as its registry entry.
#[derive(Debug)]
pub struct DeadpoolRedisPool {
    name: String,
    config: RedisConfig,
    dialer: Arc<dyn Dial>,
    /// Current resource pool. The write lock serializes closed→live
    /// transitions; steady-state traffic only clones under the read lock.
    current: RwLock<Pool>,
    rebuilds: AtomicUsize,
}

impl DeadpoolRedisPool {
    /// Build a pool instance over the production dialer.
    ///
    /// Construction is eager: the resource pool exists (though empty) when
    /// this returns, so sizing mistakes surface at startup. Must be called
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn new(name: impl Into<String>, config: RedisConfig) -> Result<Self, ConfigError> {
        let dialer: Arc<dyn Dial> = Arc::new(RedisDialer::new(&config)?);
        Self::with_dialer(name, config, dialer)
    }

    /// Build a pool instance over a caller-supplied dialer
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn with_dialer(
        name: impl Into<String>,
        mut config: RedisConfig,
        dialer: Arc<dyn Dial>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        validation::validate_pool(&name, &config)?;
        validation::clamp_pool_limits(&name, &mut config);

        let pool = Self::build_pool(&name, &config, &dialer);
        Ok(Self {
            name,
            config,
            dialer,
            current: RwLock::new(pool),
            rebuilds: AtomicUsize::new(0),
        })
    }

    fn build_pool(name: &str, config: &RedisConfig, dialer: &Arc<dyn Dial>) -> Pool {
        let manager = RedisManager::new(name, Arc::clone(dialer));
        let pool = Pool::builder(manager)
            .max_size(config.pool.limit)
            .runtime(Runtime::Tokio1)
            .build()
            .expect("failed to create resource pool");

        if !config.pool.idle_timeout.is_zero() {
            spawn_idle_reaper(pool.clone(), name.to_string(), config.pool.idle_timeout);
        }

        pool
    }

    fn current_pool(&self) -> Pool {
        self.current.read().expect("pool lock poisoned").clone()
    }

    /// Replace a closed resource pool with a live one.
    ///
    /// Callers that lose the race observe the pool built by the winner: the
    /// closed check is repeated under the write lock, so concurrent callers
    /// cannot build two pools.
    fn reinitialize(&self) -> Pool {
        let mut current = self.current.write().expect("pool lock poisoned");
        if !current.is_closed() {
            return current.clone();
        }

        let pool = Self::build_pool(&self.name, &self.config, &self.dialer);
        *current = pool.clone();
        let generation = self.rebuilds.fetch_add(1, Ordering::SeqCst) + 1;
        info!("pool '{}': resource pool rebuilt (rebuild #{})", self.name, generation);

        // Bring the recovered pool back to its configured floor without
        // making the triggering caller wait for it.
        let target = self.config.pool.prefill.min(self.config.pool.limit);
        if target > 0 {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(prewarm_connections(pool.clone(), self.name.clone(), target));
            }
        }

        pool
    }

    /// Check out a connection, waiting at most `wait`.
    ///
    /// If the resource pool is closed it is rebuilt first. A checked-out
    /// connection with a recorded failure is not handed over: a replacement
    /// is dialed and swapped into its slot, and the stale connection is
    /// closed. If the replacement dial fails, the errored connection goes
    /// back to the pool (its slot is not lost) and the dial error surfaces.
    /// There is exactly one swap attempt per checkout.
    ///
    /// # Errors
    ///
    /// See [`RedisPool::get`].
    pub async fn get(&self, wait: Option<Duration>) -> Result<PooledConn, PoolError> {
        let mut pool = self.current_pool();
        if pool.is_closed() {
            pool = self.reinitialize();
        }

        let mut timeouts = managed::Timeouts::new();
        timeouts.wait = wait;
        let mut obj = pool
            .timeout_get(&timeouts)
            .await
            .map_err(|err| map_pool_error(&self.name, wait, err))?;

        let Some(reason) = obj.last_error().map(str::to_owned) else {
            return Ok(PooledConn::pooled(obj));
        };

        warn!(
            "pool '{}': connection #{} previously failed ({}), dialing a replacement",
            self.name,
            obj.id(),
            reason
        );
        match self.dialer.dial().await {
            Ok(fresh) => {
                let stale = std::mem::replace(&mut *obj, fresh);
                stale.close();
                Ok(PooledConn::pooled(obj))
            }
            Err(err) => {
                // Hand the errored connection back so the pool's accounting
                // keeps its slot; it is swapped again on a later checkout.
                drop(obj);
                Err(err)
            }
        }
    }

    /// Return a connection to the pool.
    ///
    /// Unconditional: a connection that failed in the caller's hands is
    /// filtered on its next checkout, not on return.
    pub fn put(&self, conn: PooledConn) {
        drop(conn);
    }

    /// Open connections toward the configured prefill target and shelve
    /// them as idle. Failures are logged, not returned; prewarming is an
    /// optimization, the probe decides whether the store is reachable.
    pub async fn prewarm(&self) -> usize {
        let target = self.config.pool.prefill.min(self.config.pool.limit);
        if target == 0 {
            return 0;
        }
        let created = prewarm_connections(self.current_pool(), self.name.clone(), target).await;
        info!(
            "pool '{}': {}/{} connections prewarmed",
            self.name, created, target
        );
        created
    }

    /// Close the resource pool. A later `get` rebuilds it on demand.
    pub fn close(&self) {
        self.current_pool().close();
        debug!("pool '{}' closed", self.name);
    }

    /// Current pool status for monitoring
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let status = self.current_pool().status();
        PoolStatus {
            available: status.available,
            size: status.size,
            max_size: status.max_size,
            rebuilds: self.rebuild_count(),
        }
    }

    /// Times the resource pool has been rebuilt after a close
    #[must_use]
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }

    /// Instance name used in logs and diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RedisPool for DeadpoolRedisPool {
    async fn get(&self, wait: Option<Duration>) -> Result<PooledConn, PoolError> {
        DeadpoolRedisPool::get(self, wait).await
    }

    fn put(&self, conn: PooledConn) {
        DeadpoolRedisPool::put(self, conn);
    }

    fn status(&self) -> PoolStatus {
        DeadpoolRedisPool::status(self)
    }

    fn name(&self) -> &str {
        DeadpoolRedisPool::name(self)
    }

    fn close(&self) {
        DeadpoolRedisPool::close(self);
    }
}

fn map_pool_error(
    pool: &str,
    wait: Option<Duration>,
    err: managed::PoolError<PoolError>,
) -> PoolError {
    match err {
        managed::PoolError::Backend(err) => err,
        managed::PoolError::Timeout(_) => PoolError::WaitTimeout {
            pool: pool.to_string(),
            wait,
        },
        managed::PoolError::Closed => PoolError::Closed {
            pool: pool.to_string(),
        },
        other => PoolError::Internal {
            pool: pool.to_string(),
            message: other.to_string(),
        },
    }
}

/// Check out `target` connections concurrently, then release them all, so
/// the pool holds them idle.
async fn prewarm_connections(pool: Pool, name: String, target: usize) -> usize {
    let mut tasks = JoinSet::new();
    for i in 0..target {
        let pool = pool.clone();
        let name = name.clone();
        tasks.spawn(async move {
            match pool.get().await {
                Ok(conn) => {
                    debug!("pool '{}': prewarmed connection {}/{}", name, i + 1, target);
                    Some(conn)
                }
                Err(err) => {
                    warn!("pool '{}': prewarm dial failed: {}", name, err);
                    None
                }
            }
        });
    }

    let mut held = Vec::with_capacity(target);
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Some(conn)) = joined {
            held.push(conn);
        }
    }

    let created = held.len();
    // Dropping the guards hands every prewarmed connection back as idle.
    drop(held);
    created
}

/// Evict idle connections older than `idle_timeout`. The task exits when
/// its pool is closed; a rebuilt pool gets its own reaper.
fn spawn_idle_reaper(pool: Pool, name: String, idle_timeout: Duration) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!("pool '{}': no runtime, idle eviction disabled", name);
        return;
    };

    handle.spawn(async move {
        let period = (idle_timeout / 2).max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            let evicted = pool
                .retain(|_, metrics| metrics.last_used() <= idle_timeout)
                .removed;
            if !evicted.is_empty() {
                debug!(
                    "pool '{}': evicted {} idle connection(s)",
                    name,
                    evicted.len()
                );
                for conn in evicted {
                    conn.close();
                }
            }
        }
        debug!("pool '{}': idle reaper stopped", name);
    });
}
