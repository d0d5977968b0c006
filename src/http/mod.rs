//! HTTP front end: identity selection and status mapping around the limiter.

mod middleware;
mod server;

pub use middleware::{
    rate_limit_middleware, select_identity, IdentityError, RateLimitState, API_KEY_HEADER,
};
pub use server::{build_router, HttpServer};
