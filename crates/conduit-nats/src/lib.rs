#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for NATS client operations.
///
/// Use this target for logging publish and subscribe operations.
pub const TRACING_TARGET_CLIENT: &str = "conduit_nats::client";

/// Tracing target for NATS connection operations.
///
/// Use this target for logging connection establishment, reconnection, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "conduit_nats::connection";

mod client;
pub mod prelude;

// Re-export async_nats types needed by consumers
pub use async_nats;
pub use client::{NatsEvents, connect_options};
