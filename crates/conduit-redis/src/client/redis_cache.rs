//! Redis implementation of [`CacheDatasource`].
//!
//! Connections come from a `bb8` pool of multiplexed Redis connections. The
//! pool is created by `connect()`, which only returns once a `PING` round trip
//! succeeds, and dropped by `disconnect()`. Background connection errors are
//! forwarded to the context logger and never abort the process.

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::{self, AsyncCommands};
use conduit_core::context::{CacheContext, CacheProvider};
use conduit_core::datasource::{CacheDatasource, Datasource};
use conduit_core::{BoxedError, Error, Result};
use serde_json::Value;
use tokio::sync::RwLock;

use super::connection_url::connection_url;
use super::error_sink::ContextErrorSink;
use crate::{TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION};

/// Pool of multiplexed Redis connections.
pub type RedisPool = Pool<RedisConnectionManager>;

/// Maximum number of pooled connections.
const MAX_CONNECTIONS: u32 = 8;

/// Cache datasource backed by Redis.
#[derive(Debug)]
pub struct RedisCache {
    context: CacheContext,
    pool: RwLock<Option<RedisPool>>,
}

impl RedisCache {
    /// Creates a disconnected cache.
    pub fn new(context: CacheContext) -> Self {
        Self {
            context,
            pool: RwLock::new(None),
        }
    }

    /// Returns the live pool.
    pub async fn pool(&self) -> Result<RedisPool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::not_connected(self.context.name()))
    }

    /// Returns whether `connect()` has completed and `disconnect()` has not.
    pub async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    async fn create_pool(&self) -> Result<RedisPool> {
        let name = self.context.name();
        let CacheProvider::Redis(options) = self.context.provider() else {
            return Err(Error::config_mismatch(
                name,
                "redis",
                self.context.provider().as_str(),
            ));
        };

        let url = connection_url(options)?;
        let manager =
            RedisConnectionManager::new(url.as_str()).map_err(|e| Error::connection_with(name, e))?;

        let pool = Pool::builder()
            .max_size(MAX_CONNECTIONS)
            .connection_timeout(self.context.effective_timeout())
            .error_sink(Box::new(ContextErrorSink::new(self.context.base().clone())))
            .build(manager)
            .await
            .map_err(|e| Error::connection_with(name, e))?;

        match ping_pool(&pool).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(Error::connection(name, "unexpected reply to PING"));
            }
            Err(err) => return Err(Error::connection_with(name, err)),
        }

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            datasource = name,
            host = %options.host,
            port = options.port,
            database = options.database.unwrap_or_default(),
            "Redis connection pool ready"
        );

        Ok(pool)
    }
}

impl Datasource for RedisCache {
    type Context = CacheContext;

    fn context(&self) -> &Self::Context {
        &self.context
    }

    fn set_context(&mut self, context: Self::Context) {
        self.context = context;
    }
}

#[async_trait]
impl CacheDatasource for RedisCache {
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION, fields(datasource = self.context.name()))]
    async fn connect(&self) -> Result<()> {
        let mut slot = self.pool.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let pool = self.create_pool().await.inspect_err(|err| {
            self.context.error(format!("Failed to connect to redis: {err}"));
        })?;
        *slot = Some(pool);

        self.context.info("Connected to redis");
        Ok(())
    }

    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION, fields(datasource = self.context.name()))]
    async fn disconnect(&self) -> Result<()> {
        if self.pool.write().await.take().is_some() {
            self.context.info("Disconnected from redis");
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        let Ok(pool) = self.pool().await else {
            return false;
        };

        match ping_pool(&pool).await {
            Ok(alive) => alive,
            Err(err) => {
                tracing::debug!(
                    target: TRACING_TARGET_CONNECTION,
                    datasource = self.context.name(),
                    error = %err,
                    "Redis ping failed"
                );
                false
            }
        }
    }

    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let pool = self.pool().await?;
        let key = self.context.namespaced_key(key);

        let raw = match fetch(&pool, &key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.context
                    .warn(format!("Cache read of '{key}' failed: {err}"));
                return Ok(None);
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.context
                    .warn(format!("Cache entry '{key}' is not valid JSON: {err}"));
                Ok(None)
            }
        }
    }

    async fn set_value(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> Result<()> {
        let pool = self.pool().await?;
        let key = self.context.namespaced_key(key);
        let ttl = self.context.resolve_ttl(ttl_seconds);
        let raw = serde_json::to_string(&value)?;

        store(&pool, &key, raw, ttl)
            .await
            .map_err(|err| Error::operation_failed(self.context.name(), err))?;

        tracing::trace!(
            target: TRACING_TARGET_CLIENT,
            datasource = self.context.name(),
            key = %key,
            ttl,
            "Stored cache entry"
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let pool = self.pool().await?;
        let key = self.context.namespaced_key(key);

        remove(&pool, &key)
            .await
            .map_err(|err| Error::operation_failed(self.context.name(), err))
    }
}

async fn ping_pool(pool: &RedisPool) -> Result<bool, BoxedError> {
    let mut conn = pool.get().await?;
    let reply: String = redis::cmd("PING").query_async(&mut *conn).await?;
    Ok(reply == "PONG")
}

async fn fetch(pool: &RedisPool, key: &str) -> Result<Option<String>, BoxedError> {
    let mut conn = pool.get().await?;
    let raw: Option<String> = conn.get(key).await?;
    Ok(raw)
}

async fn store(pool: &RedisPool, key: &str, raw: String, ttl: u64) -> Result<(), BoxedError> {
    let mut conn = pool.get().await?;
    if ttl == 0 {
        let () = conn.set(key, raw).await?;
    } else {
        let () = conn.set_ex(key, raw, ttl).await?;
    }
    Ok(())
}

async fn remove(pool: &RedisPool, key: &str) -> Result<(), BoxedError> {
    let mut conn = pool.get().await?;
    let _removed: i64 = conn.del(key).await?;
    Ok(())
}
