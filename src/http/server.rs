//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::any;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::middleware::{rate_limit_middleware, RateLimitState};
use crate::error::{Result, ThrottleError};
use crate::ratelimit::RateLimiterBackend;

/// Build the router: every path is rate limited, then answered with `OK`.
pub fn build_router(rate_limiter: Arc<dyn RateLimiterBackend>) -> Router {
    let state = RateLimitState { rate_limiter };

    Router::new()
        .route("/", any(responder))
        .fallback(responder)
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

async fn responder() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// HTTP server fronting the rate limiter.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<dyn RateLimiterBackend>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<dyn RateLimiterBackend>) -> Self {
        Self { addr, rate_limiter }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server stops accepting connections when the provided signal resolves
    /// and returns once in-flight requests finish.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server");

        let app = build_router(self.rate_limiter);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            ThrottleError::Io(e)
        })
    }
}
