//! Redis-backed counter store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use super::{CounterStore, StoreError, StoreResult};

/// Counter store shared through a Redis server.
///
/// Cloning is cheap; clones share the same multiplexed connection, which
/// reconnects on its own after a dropped link.
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
    response_timeout: Duration,
}

impl RedisStore {
    /// Connect to Redis and verify the link with a PING.
    ///
    /// `address` is either `host:port` or a full `redis://` / `rediss://` URL.
    /// Every later command is bounded by `response_timeout`.
    pub async fn connect(address: &str, response_timeout: Duration) -> StoreResult<Self> {
        let url = redis_url(address);
        let client = redis::Client::open(url.as_str())?;

        let connection_manager =
            match tokio::time::timeout(response_timeout, ConnectionManager::new(client)).await {
                Ok(result) => result?,
                Err(_) => return Err(StoreError::Timeout(response_timeout)),
            };

        let store = Self {
            connection_manager,
            response_timeout,
        };
        store.ping().await?;

        info!(address = %address, "Connected to Redis counter store");
        Ok(store)
    }

    /// Round-trip a PING through the shared connection.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let reply: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        debug!(reply = %reply, "Redis ping");
        Ok(())
    }

    async fn bounded<T, F>(&self, command: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.response_timeout, command).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.response_timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.connection_manager.clone();
        self.bounded(async move { conn.incr(key, 1i64).await }).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let ms = expiry_ms(ttl)?;
        self.bounded(async move { conn.pexpire(key, ms).await }).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let ms = expiry_ms(ttl)? as u64;
        self.bounded(async move { conn.pset_ex(key, value, ms).await })
            .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        self.bounded(async move { conn.get(key).await }).await
    }
}

/// Expiry in whole milliseconds, bounded by the signed 64-bit range Redis accepts.
fn expiry_ms(ttl: Duration) -> StoreResult<i64> {
    i64::try_from(ttl.as_millis()).map_err(|_| StoreError::InvalidExpiry(ttl))
}

/// Turn a bare `host:port` into a connection URL.
fn redis_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}/", address)
    }
}
