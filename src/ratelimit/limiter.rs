//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::class::LimitClass;
use super::key::IdentityKey;
use crate::error::{Result, ThrottleError};
use crate::store::CounterStore;

/// Length of a counting window.
pub const WINDOW: Duration = Duration::from_secs(1);
/// Value stored in a block flag.
pub const BLOCKED_SENTINEL: &str = "blocked";

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request is within its quota.
    Allowed,
    /// This request pushed the identity over its quota and started a block.
    OverLimit,
    /// The identity is serving a block; nothing was counted.
    Blocked,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Validated limiter settings.
///
/// Quotas are inclusive: with a quota of N the N-th request in a window is
/// allowed and the (N+1)-th is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    ip_limit: u64,
    token_limit: u64,
    block_duration: Duration,
}

impl LimiterSettings {
    /// Validate raw settings. Every value must be non-negative.
    pub fn new(ip_limit: i64, token_limit: i64, block_duration_secs: i64) -> Result<Self> {
        let non_negative = |name: &str, value: i64| {
            u64::try_from(value).map_err(|_| {
                ThrottleError::InvalidConfiguration(format!("{} must be >= 0, got {}", name, value))
            })
        };

        Ok(Self {
            ip_limit: non_negative("ip_limit", ip_limit)?,
            token_limit: non_negative("token_limit", token_limit)?,
            block_duration: Duration::from_secs(non_negative(
                "block_duration",
                block_duration_secs,
            )?),
        })
    }

    /// Quota for the given class.
    pub fn limit_for(&self, class: LimitClass) -> u64 {
        match class {
            LimitClass::Ip => self.ip_limit,
            LimitClass::Token => self.token_limit,
        }
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}

/// The decision engine.
///
/// Holds nothing mutable besides the store handle; any number of limiters in
/// any number of processes may check the same keys concurrently, with the
/// store's atomic increment as the only synchronization point.
pub struct RateLimiter<S: ?Sized> {
    store: Arc<S>,
    settings: LimiterSettings,
}

impl<S: CounterStore + ?Sized> RateLimiter<S> {
    /// Create a limiter, failing with `InvalidConfiguration` if any value is negative.
    pub fn new(
        store: Arc<S>,
        ip_limit: i64,
        token_limit: i64,
        block_duration_secs: i64,
    ) -> Result<Self> {
        let settings = LimiterSettings::new(ip_limit, token_limit, block_duration_secs)?;
        Ok(Self::with_settings(store, settings))
    }

    /// Create a limiter from settings that are already validated.
    pub fn with_settings(store: Arc<S>, settings: LimiterSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    /// Check a key against the quota of a class given by name.
    ///
    /// An unknown class name fails before the store is touched.
    pub async fn check_limit_named(&self, key: &IdentityKey, class: &str) -> Result<Decision> {
        let class: LimitClass = class.parse()?;
        self.check_limit(key, class).await
    }

    /// Decide whether `key` may proceed, counting the request if it is not blocked.
    ///
    /// Store failures are returned as errors and never turned into a decision.
    /// The only tolerated failure is writing the block flag, since the deny
    /// has already been decided by then.
    pub async fn check_limit(&self, key: &IdentityKey, class: LimitClass) -> Result<Decision> {
        let limit = self.settings.limit_for(class);
        let block_key = key.block_key();

        trace!(key = %key, class = %class, limit = limit, "Checking rate limit");

        if let Some(flag) = self.store.get(&block_key).await? {
            if flag == BLOCKED_SENTINEL {
                debug!(key = %key, "Identity is blocked");
                return Ok(Decision::Blocked);
            }
        }

        let count = self.store.incr(key.as_str()).await?;
        if count == 1 {
            self.store.expire(key.as_str(), WINDOW).await?;
        }

        if count > limit as i64 {
            self.block(key, &block_key).await;
            debug!(
                key = %key,
                count = count,
                limit = limit,
                block_secs = self.settings.block_duration.as_secs(),
                "Rate limit exceeded, blocking identity"
            );
            return Ok(Decision::OverLimit);
        }

        Ok(Decision::Allowed)
    }

    async fn block(&self, key: &IdentityKey, block_key: &str) {
        let duration = self.settings.block_duration;
        if duration.is_zero() {
            return;
        }

        if let Err(e) = self
            .store
            .set_ex(block_key, BLOCKED_SENTINEL, duration)
            .await
        {
            warn!(key = %key, error = %e, "Failed to write block flag");
        }
    }
}
