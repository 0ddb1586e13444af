//! Dialing new connections to the store
//!
//! The [`Dial`] trait is the seam between the pool and the wire client: the
//! pool's factory and the reconnect-on-checkout swap both go through it, so
//! tests can substitute a counting double.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::debug;

use crate::config::RedisConfig;
use crate::config::validation::parse_address;
use crate::conn::RedisConn;
use crate::error::{ConfigError, PoolError};

/// Opens one authenticated session to the store.
///
/// No retries at this layer; retry policy belongs to the caller.
#[async_trait]
pub trait Dial: Send + Sync + fmt::Debug {
    /// Open a new connection
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Dial`] when the connection cannot be established
    /// or authentication/database selection fails.
    async fn dial(&self) -> Result<RedisConn, PoolError>;
}

/// Production dialer backed by the `redis` client.
///
/// Authentication and database selection happen as part of connection setup,
/// driven by the connection info built from the configuration.
#[derive(Clone)]
pub struct RedisDialer {
    address: String,
    client: Client,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl RedisDialer {
    /// Build a dialer from a pool configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] when the address is not a
    /// usable `host:port` pair.
    pub fn new(config: &RedisConfig) -> Result<Self, ConfigError> {
        let (host, port) = parse_address(&config.address)?;
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: config.database,
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = Client::open(info).map_err(|err| ConfigError::InvalidAddress {
            address: config.address.clone(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            address: config.address.clone(),
            client,
            connect_timeout: config.connect_timeout,
            // One round trip is a request write plus a reply read; the
            // multiplexed client enforces a single response deadline, so it
            // gets the sum of the two configured halves.
            response_timeout: config.read_timeout.saturating_add(config.write_timeout),
        })
    }
}

#[async_trait]
impl Dial for RedisDialer {
    async fn dial(&self) -> Result<RedisConn, PoolError> {
        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                self.response_timeout,
                self.connect_timeout,
            )
            .await
            .map_err(|source| PoolError::dial(&self.address, source))?;

        let conn = RedisConn::server(conn);
        debug!("dialed redis at {} (connection #{})", self.address, conn.id());
        Ok(conn)
    }
}

impl fmt::Debug for RedisDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Credentials stay out of debug output.
        f.debug_struct("RedisDialer")
            .field("address", &self.address)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}
