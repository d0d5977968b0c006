//! Configuration management for Throttlegate.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! process environment variables. Environment keys are the bare upper-case
//! field names (`IP_LIMIT`, `REDIS_ADDRESS`, ...). A `.env` file, when present,
//! is folded into the process environment first by [`load_env_file`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ThrottleError};
use crate::ratelimit::LimiterSettings;

/// Which counter store the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis server
    Redis,
    /// Process-local memory; limits are not shared between instances
    Memory,
}

/// Main configuration for the Throttlegate service.
///
/// Limits are kept signed here; range checks happen when the limiter is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Requests allowed per window for an IP address
    #[serde(default = "default_ip_limit")]
    pub ip_limit: i64,

    /// Requests allowed per window for an API token
    #[serde(default = "default_token_limit")]
    pub token_limit: i64,

    /// Seconds an identity stays blocked after exceeding its quota
    #[serde(default = "default_block_duration")]
    pub block_duration: i64,

    /// Redis address, `host:port` or a `redis://` URL
    #[serde(default = "default_redis_address")]
    pub redis_address: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Counter store backend
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    /// Per-command store timeout in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            ip_limit: default_ip_limit(),
            token_limit: default_token_limit(),
            block_duration: default_block_duration(),
            redis_address: default_redis_address(),
            listen_addr: default_listen_addr(),
            store_backend: default_store_backend(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_ip_limit() -> i64 {
    5
}

fn default_token_limit() -> i64 {
    10
}

fn default_block_duration() -> i64 {
    300
}

fn default_redis_address() -> String {
    "localhost:6379".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Redis
}

fn default_store_timeout_ms() -> u64 {
    500
}

impl ThrottleConfig {
    /// Load configuration from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Load configuration from an optional file and the given environment.
    ///
    /// With `env` set to `None` the process environment is read.
    pub fn load_from(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(config::Environment::default().source(env));

        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ThrottleError::Config(e.to_string()))
    }

    /// Validate the limit values into engine settings.
    pub fn limiter_settings(&self) -> Result<LimiterSettings> {
        LimiterSettings::new(self.ip_limit, self.token_limit, self.block_duration)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Load variables from an environment file into the process environment.
///
/// Without a path, `.env` is looked up from the working directory upwards and
/// a missing file is not an error. An explicit path must exist. Variables
/// already set in the environment are never overridden.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if path.is_none() && e.not_found() => Ok(None),
        Err(e) => Err(ThrottleError::Config(format!("failed to load env file: {}", e))),
    }
}
