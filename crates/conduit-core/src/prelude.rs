//! Prelude module for conduit-core.
//!
//! This module re-exports the most commonly used types and traits from conduit-core,
//! making it easy to import everything you need with a single `use` statement.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_core::prelude::*;
//!
//! # async fn example(cache: &impl CacheDatasource) -> Result<()> {
//! cache.connect().await?;
//! cache.set("greeting", &"hello", Some(60)).await?;
//! let greeting: Option<String> = cache.get("greeting").await?;
//! # Ok(())
//! # }
//! ```

// Context types
pub use crate::context::{
    BrokerOptions, CacheContext, CacheProvider, DatasourceContext, Environment, EventContext,
    NatsCredentials, NatsOptions, RedisOptions, RelationalContext, RelationalKind, RestContext,
    RetryPolicy,
};
// Contracts
pub use crate::datasource::{
    CacheDatasource, CacheDatasourceExt, Datasource, EventDatasource, EventDatasourceExt,
    EventHandler, ExecutionExt, RelationalDatasource, RelationalDatasourceExt, Row, SqlParam,
};
// Logging
pub use crate::{LogLevel, Logger, TracingLogger};
// Subscriptions
pub use crate::{Subscription, SubscriptionGroup};
// Error types
pub use crate::{BoxedError, Error, Result};
