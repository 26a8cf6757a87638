//! Redis cache datasource and connection helpers.

mod connection_url;
mod error_sink;
mod redis_cache;

pub use connection_url::connection_url;
pub use redis_cache::{RedisCache, RedisPool};
