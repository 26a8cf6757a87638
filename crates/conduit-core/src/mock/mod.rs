//! In-memory datasources for testing.
//!
//! This module provides backend-free implementations of every capability
//! trait, plus a logger that captures records for assertions. They honor the
//! same contracts as the real adapters (namespacing, TTL resolution,
//! fault-isolated subscriptions, idempotent lifecycle) so that code written
//! against the traits can be tested without a live server.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! conduit-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_core::context::{CacheContext, DatasourceContext};
//! use conduit_core::mock::{CapturingLogger, MockCache};
//! use conduit_core::prelude::*;
//!
//! let logger = CapturingLogger::new();
//! let base = DatasourceContext::new("auth-cache").with_logger(logger.clone());
//! let cache = MockCache::new(CacheContext::mock(base).with_namespace("auth"));
//!
//! cache.connect().await?;
//! cache.set("session:1", &"alice", Some(60)).await?;
//! assert_eq!(cache.get::<String>("session:1").await?, Some("alice".into()));
//! ```

mod cache;
mod event;
mod logger;
mod relational;

pub use cache::{MockCache, MockCacheStore};
pub use event::{MockBroker, MockEventBus};
pub use logger::{CapturedRecord, CapturingLogger};
pub use relational::{MockConnection, MockRelational, MockResponse};
