//! Prelude module for conduit-nats.
//!
//! This module re-exports the most commonly used types and traits from conduit-nats,
//! making it easy to import everything you need with a single `use` statement.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_nats::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let context = EventContext::nats(
//!     DatasourceContext::new("orders"),
//!     "order-service",
//!     NatsOptions::default(),
//! );
//! let events = NatsEvents::new(context);
//! events.connect().await?;
//! # Ok(())
//! # }
//! ```

// Contracts and contexts
pub use conduit_core::context::{
    DatasourceContext, EventContext, NatsCredentials, NatsOptions,
};
pub use conduit_core::datasource::{
    Datasource, EventDatasource, EventDatasourceExt, EventHandler,
};
// Error types
pub use conduit_core::{Error, Result, Subscription};

// Client types
pub use crate::client::{NatsEvents, connect_options};
