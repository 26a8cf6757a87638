use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Datasource;
use crate::Result;
use crate::context::CacheContext;

/// Key-value cache capability.
///
/// Keys are the caller's logical keys; namespacing is applied by the
/// implementation. Cache availability is best effort: `ping` and `get_value`
/// never fail because of the backend, they degrade to `false` and `None`.
/// Calling any operation before `connect` is still reported as
/// [`Error::NotConnected`](crate::Error::NotConnected).
#[async_trait]
pub trait CacheDatasource: Datasource<Context = CacheContext> {
    /// Connects to the backend and waits until it is ready.
    async fn connect(&self) -> Result<()>;

    /// Disconnects from the backend. No-op when not connected.
    async fn disconnect(&self) -> Result<()>;

    /// Returns `true` only if the backend answered the liveness probe.
    async fn ping(&self) -> bool;

    /// Returns the stored value, or `None` on a miss or backend failure.
    async fn get_value(&self, key: &str) -> Result<Option<Value>>;

    /// Stores a value.
    ///
    /// The TTL is resolved by [`CacheContext::resolve_ttl`]; a TTL of zero
    /// stores the value without expiry.
    async fn set_value(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> Result<()>;

    /// Removes a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Typed convenience methods over [`CacheDatasource`].
pub trait CacheDatasourceExt: CacheDatasource {
    /// Returns the stored value decoded as `T`.
    ///
    /// A value that does not decode as `T` is reported as a miss.
    fn get<T>(&self, key: &str) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Stores `value` encoded as JSON.
    fn set<T>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> impl Future<Output = Result<()>> + Send
    where
        T: Serialize + Sync + ?Sized;
}

impl<C: CacheDatasource + ?Sized> CacheDatasourceExt for C {
    fn get<T>(&self, key: &str) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            let Some(value) = self.get_value(key).await? else {
                return Ok(None);
            };

            match serde_json::from_value(value) {
                Ok(decoded) => Ok(Some(decoded)),
                Err(err) => {
                    self.context()
                        .warn(format!("Cached value for '{key}' has an unexpected shape: {err}"));
                    Ok(None)
                }
            }
        }
    }

    fn set<T>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> impl Future<Output = Result<()>> + Send
    where
        T: Serialize + Sync + ?Sized,
    {
        let encoded = serde_json::to_value(value);
        async move { self.set_value(key, encoded?, ttl_seconds).await }
    }
}
