//! Resource-pool manager backed by a dialer

use std::sync::Arc;

use deadpool::managed;
use tracing::debug;

use crate::conn::RedisConn;
use crate::dial::Dial;
use crate::error::PoolError;

/// Connection manager for the generic resource pool.
///
/// The factory is the dialer; the pool calls it whenever it needs a new
/// connection to satisfy demand up to its limit.
#[derive(Debug)]
pub struct RedisManager {
    name: String,
    dialer: Arc<dyn Dial>,
}

impl RedisManager {
    pub(crate) fn new(name: impl Into<String>, dialer: Arc<dyn Dial>) -> Self {
        Self {
            name: name.into(),
            dialer,
        }
    }
}

impl managed::Manager for RedisManager {
    type Type = RedisConn;
    type Error = PoolError;

    async fn create(&self) -> Result<RedisConn, PoolError> {
        let conn = self.dialer.dial().await?;
        debug!("pool '{}': created connection #{}", self.name, conn.id());
        Ok(conn)
    }

    async fn recycle(
        &self,
        _conn: &mut RedisConn,
        _: &managed::Metrics,
    ) -> managed::RecycleResult<PoolError> {
        // Poisoned connections are filtered at checkout, not here: the
        // checkout swap keeps the pool slot when a replacement dial fails,
        // which a recycle rejection could not.
        Ok(())
    }

    fn detach(&self, conn: &mut RedisConn) {
        debug!("pool '{}': connection #{} detached", self.name, conn.id());
    }
}

pub(crate) type Pool = managed::Pool<RedisManager>;
