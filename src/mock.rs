//! Test doubles for the dialer and the pool abstraction
//!
//! These are deterministic stand-ins used by the crate's own tests: a
//! scripted transport, a dial counter that can be told to fail, and a
//! [`RedisPool`] double that simulates exhaustion and closed states without
//! a server.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::Value;

use crate::conn::RedisConn;
use crate::dial::Dial;
use crate::error::PoolError;
use crate::pool::{PoolStatus, PooledConn, RedisPool, Shelf};

/// Scripted wire session.
///
/// Replies are served from a queue; once drained, the fallback applies
/// forever. Errors are produced as broken-pipe I/O failures, the kind the
/// connection wrapper treats as fatal to the session.
#[derive(Debug)]
pub struct MockTransport {
    replies: VecDeque<Result<Value, String>>,
    fallback: Result<Value, String>,
    close_error: Option<String>,
    commands: usize,
}

impl MockTransport {
    /// A transport that answers every command with `OK`
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            replies: VecDeque::new(),
            fallback: Ok(Value::Okay),
            close_error: None,
            commands: 0,
        }
    }

    /// A transport where every command fails at the I/O layer
    #[must_use]
    pub fn broken(reason: impl Into<String>) -> Self {
        Self {
            replies: VecDeque::new(),
            fallback: Err(reason.into()),
            close_error: None,
            commands: 0,
        }
    }

    /// Queue a one-shot reply ahead of the fallback
    #[must_use]
    pub fn enqueue_reply(mut self, value: Value) -> Self {
        self.replies.push_back(Ok(value));
        self
    }

    /// Queue a one-shot I/O failure ahead of the fallback
    #[must_use]
    pub fn enqueue_error(mut self, reason: impl Into<String>) -> Self {
        self.replies.push_back(Err(reason.into()));
        self
    }

    /// Make `close` report a failure (which the wrapper must swallow)
    #[must_use]
    pub fn with_close_error(mut self, reason: impl Into<String>) -> Self {
        self.close_error = Some(reason.into());
        self
    }

    /// Wrap this transport in a connection
    #[must_use]
    pub fn into_conn(self) -> RedisConn {
        RedisConn::mock(self)
    }

    /// Number of commands executed against this transport
    #[must_use]
    pub fn commands_seen(&self) -> usize {
        self.commands
    }

    pub(crate) fn command(&mut self) -> redis::RedisResult<Value> {
        self.commands += 1;
        let outcome = self
            .replies
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        outcome.map_err(|reason| {
            redis::RedisError::from(io::Error::new(io::ErrorKind::BrokenPipe, reason))
        })
    }

    pub(crate) fn close(&mut self) -> Result<(), String> {
        match self.close_error.take() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// Dialer double: hands out healthy mock connections and counts dials.
///
/// Flip [`set_failing`](Self::set_failing) to make every dial fail, e.g. to
/// exercise the replacement-dial failure path at checkout.
#[derive(Debug, Clone, Default)]
pub struct MockDialer {
    dials: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MockDialer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dial attempts made so far, successful or not
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// When set, every subsequent dial fails with a connection-refused error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Dial for MockDialer {
    async fn dial(&self) -> Result<RedisConn, PoolError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PoolError::dial(
                "mock:0",
                redis::RedisError::from(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "mock dialer set to fail",
                )),
            ));
        }
        Ok(MockTransport::healthy().into_conn())
    }
}

/// [`RedisPool`] double with switchable exhaustion and closed states.
///
/// Connections checked out of this pool come back to its idle shelf when
/// dropped or `put`, so get/put sequences behave like the real pool.
#[derive(Debug)]
pub struct MockRedisPool {
    name: String,
    idle: Shelf,
    exhausted: AtomicBool,
    closed: AtomicBool,
}

impl MockRedisPool {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            idle: Arc::new(Mutex::new(VecDeque::new())),
            exhausted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Preload an idle connection
    pub fn push(&self, conn: RedisConn) {
        self.idle
            .lock()
            .expect("mock shelf lock poisoned")
            .push_back(conn);
    }

    /// Simulate a pool with no connections to give: `get` waits out the
    /// caller's deadline and fails with a timeout
    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::SeqCst);
    }

    /// Number of idle connections currently shelved
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.idle.lock().expect("mock shelf lock poisoned").len()
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RedisPool for MockRedisPool {
    async fn get(&self, wait: Option<Duration>) -> Result<PooledConn, PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed {
                pool: self.name.clone(),
            });
        }
        if self.exhausted.load(Ordering::SeqCst) {
            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }
            return Err(PoolError::WaitTimeout {
                pool: self.name.clone(),
                wait,
            });
        }

        let conn = {
            let mut idle = self.idle.lock().expect("mock shelf lock poisoned");
            idle.pop_front()
        };
        let conn = conn.unwrap_or_else(|| MockTransport::healthy().into_conn());
        Ok(PooledConn::loose(conn, Some(Arc::clone(&self.idle))))
    }

    fn status(&self) -> PoolStatus {
        let idle = self.idle_len();
        PoolStatus {
            available: idle,
            size: idle,
            max_size: idle,
            rebuilds: 0,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
