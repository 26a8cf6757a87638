//! Prelude module for conduit-redis.
//!
//! This module re-exports the most commonly used types and traits from conduit-redis,
//! making it easy to import everything you need with a single `use` statement.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_redis::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let context = CacheContext::redis(DatasourceContext::new("auth-cache"), RedisOptions::default())
//!     .with_namespace("auth");
//! let cache = RedisCache::new(context);
//! cache.connect().await?;
//! # Ok(())
//! # }
//! ```

// Contracts and contexts
pub use conduit_core::context::{CacheContext, DatasourceContext, RedisOptions};
pub use conduit_core::datasource::{CacheDatasource, CacheDatasourceExt, Datasource};
// Error types
pub use conduit_core::{Error, Result};

// Client types
pub use crate::client::{RedisCache, RedisPool, connection_url};
