//! Connection pooling
//!
//! The policy layer wrapped around the generic resource pool: the
//! [`RedisPool`] abstraction, the RAII checkout guard, the pool manager and
//! the production pool instance.

mod instance;
mod manager;

pub use instance::DeadpoolRedisPool;
pub use manager::RedisManager;

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::Object;

use crate::conn::RedisConn;
use crate::error::PoolError;

/// Idle shelf used by loose (non-deadpool) checkout guards, e.g. the mock
/// pool double.
pub(crate) type Shelf = Arc<Mutex<VecDeque<RedisConn>>>;

/// Pool status snapshot for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections idle and ready to be checked out
    pub available: usize,
    /// Connections currently in existence, idle or checked out
    pub size: usize,
    /// Hard cap on concurrently live connections
    pub max_size: usize,
    /// Times the underlying resource pool has been rebuilt after a close
    pub rebuilds: usize,
}

/// Abstraction over checkout/return against one pool instance.
///
/// The production implementation is [`DeadpoolRedisPool`]; tests substitute
/// [`crate::mock::MockRedisPool`] to simulate exhaustion and closed states
/// deterministically.
#[async_trait]
pub trait RedisPool: Send + Sync + fmt::Debug {
    /// Check out a connection, waiting at most `wait` for one to become
    /// available. `None` waits without a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::WaitTimeout`] when the pool cannot supply a
    /// connection in time, [`PoolError::Closed`] when the pool was closed,
    /// or [`PoolError::Dial`] when replacing a broken connection failed.
    async fn get(&self, wait: Option<Duration>) -> Result<PooledConn, PoolError>;

    /// Return a connection to the pool.
    ///
    /// The return is unconditional; health filtering happens at the next
    /// checkout. Dropping the guard has the same effect, `put` just makes
    /// the handoff explicit.
    fn put(&self, conn: PooledConn) {
        drop(conn);
    }

    /// Current pool status for monitoring
    fn status(&self) -> PoolStatus;

    /// Instance name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Close the pool; a later `get` rebuilds it on demand
    fn close(&self);
}

enum Slot {
    Pooled(Object<RedisManager>),
    Loose {
        conn: RedisConn,
        shelf: Option<Shelf>,
    },
}

/// Checked-out connection guard.
///
/// Dereferences to [`RedisConn`]. Dropping the guard returns the connection
/// to its pool; [`detach`](Self::detach) takes it out permanently.
pub struct PooledConn {
    slot: Option<Slot>,
}

impl PooledConn {
    pub(crate) fn pooled(obj: Object<RedisManager>) -> Self {
        Self {
            slot: Some(Slot::Pooled(obj)),
        }
    }

    pub(crate) fn loose(conn: RedisConn, shelf: Option<Shelf>) -> Self {
        Self {
            slot: Some(Slot::Loose { conn, shelf }),
        }
    }

    /// Take the connection out of its pool permanently.
    ///
    /// The pool's accounting forgets the connection; it will not come back
    /// on drop.
    #[must_use]
    pub fn detach(mut self) -> RedisConn {
        match self.slot.take() {
            Some(Slot::Pooled(obj)) => Object::take(obj),
            Some(Slot::Loose { conn, .. }) => conn,
            None => unreachable!("connection slot already taken"),
        }
    }

    fn conn(&self) -> &RedisConn {
        match self.slot.as_ref().expect("connection slot already taken") {
            Slot::Pooled(obj) => obj,
            Slot::Loose { conn, .. } => conn,
        }
    }

    fn conn_mut(&mut self) -> &mut RedisConn {
        match self.slot.as_mut().expect("connection slot already taken") {
            Slot::Pooled(obj) => obj,
            Slot::Loose { conn, .. } => conn,
        }
    }
}

impl Deref for PooledConn {
    type Target = RedisConn;

    fn deref(&self) -> &RedisConn {
        self.conn()
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut RedisConn {
        self.conn_mut()
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        // Deadpool objects hand themselves back on drop; loose connections
        // go back to their shelf when one exists.
        if let Some(Slot::Loose {
            conn,
            shelf: Some(shelf),
        }) = self.slot.take()
        {
            shelf.lock().expect("shelf lock poisoned").push_back(conn);
        }
    }
}

impl fmt::Debug for PooledConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            Some(_) => f
                .debug_struct("PooledConn")
                .field("id", &self.conn().id())
                .finish(),
            None => f.write_str("PooledConn(detached)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[test]
    fn test_loose_guard_reshelves_on_drop() {
        let shelf: Shelf = Arc::new(Mutex::new(VecDeque::new()));
        let guard = PooledConn::loose(
            MockTransport::healthy().into_conn(),
            Some(Arc::clone(&shelf)),
        );

        drop(guard);
        assert_eq!(shelf.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_detach_skips_the_shelf() {
        let shelf: Shelf = Arc::new(Mutex::new(VecDeque::new()));
        let guard = PooledConn::loose(
            MockTransport::healthy().into_conn(),
            Some(Arc::clone(&shelf)),
        );

        let conn = guard.detach();
        assert!(shelf.lock().unwrap().is_empty());
        conn.close();
    }

    #[test]
    fn test_guard_derefs_to_connection() {
        let mut guard = PooledConn::loose(MockTransport::healthy().into_conn(), None);
        assert!(guard.last_error().is_none());

        guard.record_failure("poisoned");
        assert_eq!(guard.last_error(), Some("poisoned"));
    }
}
