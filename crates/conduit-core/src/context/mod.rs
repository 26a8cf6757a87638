//! Typed configuration records injected into datasources at construction.

mod cache_context;
mod datasource_context;
mod event_context;
mod relational_context;
mod rest_context;

pub use cache_context::{
    CacheContext, CacheProvider, DEFAULT_CACHE_TTL_SECS, DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT,
    MemcachedOptions, RedisOptions,
};
pub use datasource_context::{
    DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_MAX_DELAY, DEFAULT_TIMEOUT,
    DatasourceContext, Environment, RetryPolicy,
};
pub use event_context::{
    BrokerOptions, DEFAULT_NATS_MAX_RECONNECTS, DEFAULT_NATS_SERVER, EventContext, KafkaOptions,
    NatsCredentials, NatsOptions, is_valid_nats_server,
};
pub use relational_context::{DEFAULT_POOL_SIZE, RelationalContext, RelationalKind};
pub use rest_context::RestContext;
