//! Prelude module for conduit-postgres.
//!
//! This module re-exports the most commonly used types and traits from conduit-postgres,
//! making it easy to import everything you need with a single `use` statement.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_postgres::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let context = RelationalContext::postgres(DatasourceContext::new("users-db"))
//!     .with_database("users");
//! let db = PgDatasource::new(context);
//! db.connect().await?;
//! # Ok(())
//! # }
//! ```

// Contracts and contexts
pub use conduit_core::context::{DatasourceContext, RelationalContext, RelationalKind};
pub use conduit_core::datasource::{
    Datasource, RelationalDatasource, RelationalDatasourceExt, Row, SqlParam,
};
// Error types
pub use conduit_core::{Error, Result};

// Client types
pub use crate::client::{ConnectionPool, PgDatasource, PooledConnection, connection_url};
// Migrations
pub use crate::{EmbeddedMigrations, embed_migrations};
