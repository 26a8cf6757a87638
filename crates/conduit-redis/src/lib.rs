#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for Redis cache operations.
///
/// Use this target for logging get, set and delete operations.
pub const TRACING_TARGET_CLIENT: &str = "conduit_redis::client";

/// Tracing target for Redis connection operations.
///
/// Use this target for logging pool creation, readiness checks and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "conduit_redis::connection";

mod client;
pub mod prelude;

// Re-export the pooled client crates needed by consumers
pub use bb8_redis::{bb8, redis};
pub use client::{RedisCache, RedisPool, connection_url};
