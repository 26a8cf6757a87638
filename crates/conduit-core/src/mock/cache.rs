use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::context::CacheContext;
use crate::datasource::{CacheDatasource, Datasource};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Backing store shared by one or more [`MockCache`] instances.
///
/// Entries are keyed by backend key, i.e. after namespacing.
#[derive(Debug, Clone, Default)]
pub struct MockCacheStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MockCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live backend keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the remaining lifetime of a backend key.
    ///
    /// `Some(None)` means the key is stored without expiry.
    pub async fn time_to_live(&self, backend_key: &str) -> Option<Option<Duration>> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let entry = entries.get(backend_key).filter(|entry| entry.is_live(now))?;
        Some(entry.expires_at.map(|at| at - now))
    }
}

/// In-memory [`CacheDatasource`].
#[derive(Debug)]
pub struct MockCache {
    context: CacheContext,
    store: MockCacheStore,
    connected: Mutex<bool>,
}

impl MockCache {
    /// Creates a cache with its own empty store.
    pub fn new(context: CacheContext) -> Self {
        Self::with_store(context, MockCacheStore::new())
    }

    /// Creates a cache over an existing store.
    pub fn with_store(context: CacheContext, store: MockCacheStore) -> Self {
        Self {
            context,
            store,
            connected: Mutex::new(false),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &MockCacheStore {
        &self.store
    }

    async fn ensure_connected(&self) -> Result<()> {
        if *self.connected.lock().await {
            Ok(())
        } else {
            Err(Error::not_connected(self.context.name()))
        }
    }
}

impl Datasource for MockCache {
    type Context = CacheContext;

    fn context(&self) -> &Self::Context {
        &self.context
    }

    fn set_context(&mut self, context: Self::Context) {
        self.context = context;
    }
}

#[async_trait]
impl CacheDatasource for MockCache {
    async fn connect(&self) -> Result<()> {
        *self.connected.lock().await = true;
        self.context.info("Connected to in-memory cache");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut connected = self.connected.lock().await;
        if *connected {
            *connected = false;
            self.context.info("Disconnected from in-memory cache");
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        *self.connected.lock().await
    }

    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_connected().await?;

        let key = self.context.namespaced_key(key);
        let now = Instant::now();
        let mut entries = self.store.entries.lock().await;

        match entries.get(key.as_ref()) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key.as_ref());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_value(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> Result<()> {
        self.ensure_connected().await?;

        let ttl = self.context.resolve_ttl(ttl_seconds);
        let expires_at = (ttl > 0).then(|| Instant::now() + Duration::from_secs(ttl));
        let key = self.context.namespaced_key(key).into_owned();

        self.store
            .entries
            .lock()
            .await
            .insert(key, Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_connected().await?;

        let key = self.context.namespaced_key(key);
        self.store.entries.lock().await.remove(key.as_ref());
        Ok(())
    }
}
