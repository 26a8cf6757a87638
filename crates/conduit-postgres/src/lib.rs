#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for database connection operations.
///
/// Use this target for logging connection establishment, pool hooks, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "conduit_postgres::connection";

/// Tracing target for database query operations.
///
/// Use this target for logging statement execution and query failures.
pub const TRACING_TARGET_QUERY: &str = "conduit_postgres::query";

/// Tracing target for database migration operations.
///
/// Use this target for logging migration execution, rollbacks, and schema changes.
pub const TRACING_TARGET_MIGRATION: &str = "conduit_postgres::migration";

mod client;
pub mod prelude;

// Re-export diesel types needed by consumers
pub use diesel_migrations::{EmbeddedMigrations, embed_migrations};
pub use client::{ConnectionPool, PgDatasource, PooledConnection, connection_url};
