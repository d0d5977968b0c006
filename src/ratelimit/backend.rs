//! Rate limiter trait for abstracting the decision engine from its callers.

use async_trait::async_trait;

use super::class::LimitClass;
use super::key::IdentityKey;
use super::limiter::{Decision, RateLimiter};
use crate::error::Result;
use crate::store::CounterStore;

/// Trait for rate limiter implementations.
///
/// The HTTP layer holds a `dyn RateLimiterBackend`, which lets it run against
/// any store and lets wrappers (retries, circuit breakers) sit in between.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Check the rate limit for a key under the quota of `class`.
    async fn check_limit(&self, key: &IdentityKey, class: LimitClass) -> Result<Decision>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> RateLimiterBackend for RateLimiter<S> {
    async fn check_limit(&self, key: &IdentityKey, class: LimitClass) -> Result<Decision> {
        RateLimiter::check_limit(self, key, class).await
    }
}
