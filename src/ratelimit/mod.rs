//! Rate limiting decisions and identity handling.

mod backend;
mod class;
mod key;
mod limiter;

pub use backend::RateLimiterBackend;
pub use class::LimitClass;
pub use key::IdentityKey;
pub use limiter::{Decision, LimiterSettings, RateLimiter, BLOCKED_SENTINEL, WINDOW};
