//! Cache datasource context.

use std::borrow::Cow;
use std::fmt;

use derive_more::Deref;
use serde::{Deserialize, Serialize};

use super::DatasourceContext;
use crate::{Error, Result};

/// TTL applied when neither the call nor the context specify one.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default Redis host.
pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";

/// Default Redis port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Connection options for a Redis cache.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisOptions {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// ACL username
    pub username: Option<String>,
    /// ACL password
    pub password: Option<String>,
    /// Logical database index
    pub database: Option<i64>,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.to_owned(),
            port: DEFAULT_REDIS_PORT,
            username: None,
            password: None,
            database: None,
        }
    }
}

impl RedisOptions {
    /// Create options for the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into()).filter(|u: &String| !u.is_empty());
        self.password = Some(password.into()).filter(|p: &String| !p.is_empty());
        self
    }

    /// Set the logical database index.
    #[must_use]
    pub fn with_database(mut self, database: i64) -> Self {
        self.database = Some(database);
        self
    }
}

impl fmt::Debug for RedisOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// Connection options for a Memcached cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemcachedOptions {
    /// Server addresses in `host:port` form
    pub servers: Vec<String>,
}

/// Backend a cache datasource talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum CacheProvider {
    Redis(RedisOptions),
    Memcached(MemcachedOptions),
    Mock,
}

impl CacheProvider {
    /// Returns the provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memcached(_) => "memcached",
            Self::Mock => "mock",
        }
    }
}

/// Context for cache datasources.
///
/// Dereferences to the base [`DatasourceContext`].
#[derive(Debug, Clone, Deref)]
pub struct CacheContext {
    #[deref]
    base: DatasourceContext,
    provider: CacheProvider,
    namespace: Option<String>,
    ttl_default_seconds: Option<u64>,
}

impl CacheContext {
    /// Create a new cache context.
    pub fn new(base: DatasourceContext, provider: CacheProvider) -> Self {
        Self {
            base,
            provider,
            namespace: None,
            ttl_default_seconds: None,
        }
    }

    /// Create a new Redis cache context.
    pub fn redis(base: DatasourceContext, options: RedisOptions) -> Self {
        Self::new(base, CacheProvider::Redis(options))
    }

    /// Create a new in-memory cache context.
    pub fn mock(base: DatasourceContext) -> Self {
        Self::new(base, CacheProvider::Mock)
    }

    /// Set the key namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into()).filter(|n: &String| !n.is_empty());
        self
    }

    /// Set the default TTL in seconds.
    #[must_use]
    pub fn with_ttl_default_seconds(mut self, ttl: u64) -> Self {
        self.ttl_default_seconds = Some(ttl);
        self
    }

    /// Returns the base context.
    #[inline]
    pub fn base(&self) -> &DatasourceContext {
        &self.base
    }

    /// Returns the provider.
    #[inline]
    pub fn provider(&self) -> &CacheProvider {
        &self.provider
    }

    /// Returns the key namespace.
    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the default TTL in seconds.
    #[inline]
    pub fn ttl_default_seconds(&self) -> Option<u64> {
        self.ttl_default_seconds
    }

    /// Returns the backend key for a caller's logical key.
    pub fn namespaced_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.namespace {
            Some(namespace) => Cow::Owned(format!("{namespace}:{key}")),
            None => Cow::Borrowed(key),
        }
    }

    /// Returns the TTL to apply: explicit argument, then context default, then 3600s.
    #[inline]
    pub fn resolve_ttl(&self, explicit: Option<u64>) -> u64 {
        explicit
            .or(self.ttl_default_seconds)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS)
    }

    /// Validate the context.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if let CacheProvider::Redis(options) = &self.provider
            && options.host.is_empty()
        {
            return Err(Error::invalid_config("redis host cannot be empty"));
        }
        Ok(())
    }
}

impl AsRef<DatasourceContext> for CacheContext {
    fn as_ref(&self) -> &DatasourceContext {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CacheContext {
        CacheContext::redis(DatasourceContext::new("auth-cache"), RedisOptions::default())
    }

    #[test]
    fn test_key_without_namespace() {
        let ctx = context();
        assert_eq!(ctx.namespaced_key("session:1"), "session:1");
    }

    #[test]
    fn test_key_with_namespace() {
        let ctx = context().with_namespace("auth-service");
        assert_eq!(ctx.namespaced_key("session:1"), "auth-service:session:1");
    }

    #[test]
    fn test_empty_namespace_is_ignored() {
        let ctx = context().with_namespace("");
        assert_eq!(ctx.namespace(), None);
        assert_eq!(ctx.namespaced_key("k"), "k");
    }

    #[test]
    fn test_ttl_resolution_order() {
        let ctx = context();
        assert_eq!(ctx.resolve_ttl(None), DEFAULT_CACHE_TTL_SECS);

        let ctx = ctx.with_ttl_default_seconds(120);
        assert_eq!(ctx.resolve_ttl(None), 120);
        assert_eq!(ctx.resolve_ttl(Some(5)), 5);
    }

    #[test]
    fn test_redis_defaults() {
        let options = RedisOptions::default();
        assert_eq!(options.host, "127.0.0.1");
        assert_eq!(options.port, 6379);
    }

    #[test]
    fn test_password_is_redacted() {
        let options = RedisOptions::default().with_credentials("svc", "hunter2");
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(context().provider().as_str(), "redis");
        assert_eq!(CacheProvider::Mock.as_str(), "mock");
    }
}
