//! Rate limiting middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, instrument};

use crate::ratelimit::{IdentityKey, LimitClass, RateLimiterBackend};

/// Header carrying the caller's API token.
pub const API_KEY_HEADER: &str = "api_key";

pub(crate) const RATE_LIMIT_EXCEEDED_MSG: &str =
    "you have reached the maximum number of requests or actions allowed within a certain time frame";
pub(crate) const INVALID_REMOTE_ADDR_MSG: &str = "invalid remote address";
pub(crate) const INVALID_API_KEY_MSG: &str = "invalid api key header";
pub(crate) const INTERNAL_ERROR_MSG: &str = "internal server error";

/// Shared state for the middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub rate_limiter: Arc<dyn RateLimiterBackend>,
}

/// Why a request has no identity to be limited by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// The API token header holds bytes outside visible ASCII
    InvalidApiKey,
    /// No token and no peer address
    MissingRemoteAddr,
}

impl IdentityError {
    fn message(self) -> &'static str {
        match self {
            IdentityError::InvalidApiKey => INVALID_API_KEY_MSG,
            IdentityError::MissingRemoteAddr => INVALID_REMOTE_ADDR_MSG,
        }
    }
}

/// Pick the identity a request is limited by.
///
/// A non-empty API token wins; otherwise the peer IP address is used. A
/// token header that is not visible ASCII is rejected rather than ignored,
/// so it can never fall back to the IP quota.
pub fn select_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Result<(IdentityKey, LimitClass), IdentityError> {
    if let Some(value) = headers.get(API_KEY_HEADER) {
        let api_key = value.to_str().map_err(|_| IdentityError::InvalidApiKey)?;
        if !api_key.is_empty() {
            return Ok((IdentityKey::token(api_key), LimitClass::Token));
        }
    }

    peer.map(|addr| (IdentityKey::ip(addr.ip()), LimitClass::Ip))
        .ok_or(IdentityError::MissingRemoteAddr)
}

/// Check the request's identity before handing it on.
///
/// Over-limit identities get 429; a failing store gets 500 so that outages
/// are never reported to clients as throttling.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (key, class) = match select_identity(request.headers(), peer) {
        Ok(identity) => identity,
        Err(e) => {
            debug!(reason = ?e, "Rejecting request without a usable identity");
            return (StatusCode::BAD_REQUEST, e.message()).into_response();
        }
    };

    debug!(key = %key, class = %class, "Limiting request");

    match state.rate_limiter.check_limit(&key, class).await {
        Ok(decision) if decision.is_allowed() => next.run(request).await,
        Ok(decision) => {
            debug!(key = %key, decision = ?decision, "Request denied");
            (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_EXCEEDED_MSG).into_response()
        }
        Err(e) => {
            error!(key = %key, error = %e, "Rate limit check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MSG).into_response()
        }
    }
}
