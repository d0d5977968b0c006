//! Shared counter store clients.
//!
//! The decision engine only needs four primitives from its store: atomic
//! increment, expiry, set-with-expiry and get. Every engine instance talking
//! to the same store sees the same counters, so the store is the only point
//! of synchronization between processes.

mod memory;
mod redis_store;

#[cfg(test)]
pub(crate) mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors raised while talking to a counter store.
///
/// A missing key is never an error; `get` reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("expiry of {0:?} is out of range for this store")]
    InvalidExpiry(Duration),
    #[error("value stored at {0} is not an integer")]
    NotAnInteger(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value primitives the decision engine relies on.
///
/// Implementations must make `incr` atomic: two concurrent increments of the
/// same key always return two distinct values.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the integer at `key` by one and return the new value.
    ///
    /// A missing key counts as zero, so the first increment returns 1.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Set a time-to-live on an existing key.
    ///
    /// Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Store `value` at `key`, replacing any previous value, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Read the value at `key`, or `None` if it is absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
}
