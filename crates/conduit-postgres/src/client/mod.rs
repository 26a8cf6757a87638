//! PostgreSQL datasource with connection pooling and migration management.

mod bind;
mod connection_url;
mod custom_hooks;
mod migrate;
mod pg_datasource;

use deadpool::managed::{Object, Pool};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;

pub use connection_url::connection_url;
pub use pg_datasource::PgDatasource;

/// Type alias for the connection pool behind a [`PgDatasource`].
pub type ConnectionPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Type alias for a connection object from the pool.
pub type PooledConnection = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;
