//! Throttlegate - Per-Identity Request Throttling
//!
//! This crate limits how many requests a client IP address or API token may
//! make per one-second window. Identities that exceed their quota are blocked
//! for a configured duration. All counters and block flags live in a shared
//! store (Redis in production), so any number of service instances enforce
//! the same limits.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
