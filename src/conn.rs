//! Connection wrapper with sticky error tracking
//!
//! A [`RedisConn`] owns one authenticated session to the store. Command
//! failures that indicate a broken transport are recorded on the wrapper so
//! the pool can refuse to hand the connection out again; the resource pool
//! itself has no visibility into application-level connection health.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use redis::aio::MultiplexedConnection;
use redis::{Cmd, Value};
use tracing::{debug, warn};

use crate::error::PoolError;
use crate::mock::MockTransport;

/// Process-wide counter for connection ids, used in logs and tests to tell
/// transport handles apart.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// The underlying wire session.
///
/// Production connections are multiplexed sessions from the `redis` crate;
/// the mock variant backs the test doubles in [`crate::mock`].
pub(crate) enum Transport {
    Server(MultiplexedConnection),
    Mock(MockTransport),
}

impl Transport {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Server(_) => "server",
            Self::Mock(_) => "mock",
        }
    }
}

/// One authenticated session to the store.
///
/// Exclusively owned by whoever holds it: the resource pool while idle, a
/// caller between `get` and `put`.
pub struct RedisConn {
    id: u64,
    transport: Transport,
    last_error: Option<String>,
}

impl RedisConn {
    pub(crate) fn new(transport: Transport) -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            last_error: None,
        }
    }

    pub(crate) fn server(conn: MultiplexedConnection) -> Self {
        Self::new(Transport::Server(conn))
    }

    pub(crate) fn mock(transport: MockTransport) -> Self {
        Self::new(Transport::Mock(transport))
    }

    /// Process-unique id of this connection's transport handle
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Last connection-level failure observed on this session, if any.
    ///
    /// A connection with a recorded failure is replaced at its next checkout
    /// instead of being handed to a caller.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a connection-level failure. The first recorded failure wins;
    /// later ones are ignored so the original cause is kept.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        if self.last_error.is_none() {
            self.last_error = Some(reason.into());
        }
    }

    /// Run one command round trip on this session.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Command`] when the round trip fails. Failures
    /// that indicate a broken transport (I/O errors, dropped connections,
    /// unrecoverable protocol state) are also recorded via
    /// [`record_failure`](Self::record_failure).
    pub async fn execute(&mut self, cmd: &Cmd) -> Result<Value, PoolError> {
        let outcome: redis::RedisResult<Value> = match &mut self.transport {
            Transport::Server(conn) => cmd.query_async(conn).await,
            Transport::Mock(mock) => mock.command(),
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(source) => {
                if is_fatal(&source) {
                    self.record_failure(source.to_string());
                }
                Err(PoolError::Command { source })
            }
        }
    }

    /// PING round trip, used by the bootstrap probe
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Command`] when the round trip fails.
    pub async fn ping(&mut self) -> Result<(), PoolError> {
        self.execute(&redis::cmd("PING")).await.map(|_| ())
    }

    /// Release the underlying transport.
    ///
    /// Close failures are logged and swallowed: close runs on cleanup paths
    /// where a second error has nowhere useful to go.
    pub fn close(self) {
        match self.transport {
            Transport::Server(conn) => {
                // Dropping the handle tears down the multiplexed driver.
                drop(conn);
                debug!("closed redis connection #{}", self.id);
            }
            Transport::Mock(mut mock) => {
                if let Err(err) = mock.close() {
                    warn!("error closing connection #{}: {}", self.id, err);
                } else {
                    debug!("closed redis connection #{}", self.id);
                }
            }
        }
    }
}

impl fmt::Debug for RedisConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConn")
            .field("id", &self.id)
            .field("transport", &self.transport.kind())
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Whether a command failure means the session itself is broken, as opposed
/// to a server-side error reply on a healthy transport.
fn is_fatal(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_unrecoverable_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[tokio::test]
    async fn test_execute_returns_scripted_reply() {
        let mut conn = MockTransport::healthy().into_conn();

        let value = conn.execute(&redis::cmd("PING")).await.unwrap();
        assert_eq!(value, Value::Okay);
        assert!(conn.last_error().is_none());
    }

    #[tokio::test]
    async fn test_io_failure_is_sticky() {
        let mut conn = MockTransport::broken("connection reset by peer").into_conn();

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, PoolError::Command { .. }));
        assert!(conn.last_error().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        let mut conn = MockTransport::healthy().into_conn();

        conn.record_failure("first");
        conn.record_failure("second");
        assert_eq!(conn.last_error(), Some("first"));
    }

    #[tokio::test]
    async fn test_failure_after_success() {
        let mut conn = MockTransport::healthy()
            .enqueue_error("broken pipe")
            .into_conn();

        assert!(conn.ping().await.is_err());
        assert!(conn.last_error().is_some());

        // The scripted queue is drained; the fallback reply is healthy, but
        // the sticky error must survive later successes.
        assert!(conn.ping().await.is_ok());
        assert!(conn.last_error().is_some());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let a = MockTransport::healthy().into_conn();
        let b = MockTransport::healthy().into_conn();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_close_swallows_errors() {
        let conn = MockTransport::healthy()
            .with_close_error("already gone")
            .into_conn();

        // Must not panic or surface the failure.
        conn.close();
    }
}
