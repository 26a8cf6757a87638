//! Datasource argument groups.
//!
//! Every group is optional: a datasource is probed only when its primary
//! argument (host, server list, URL) is present.

use std::time::Duration;

use anyhow::{Result as AnyhowResult, anyhow};
use clap::Args;
use conduit_core::context::{
    CacheContext, DatasourceContext, EventContext, NatsCredentials, NatsOptions, RedisOptions,
    RelationalContext, RestContext,
};
use serde::{Deserialize, Serialize};

/// Redis cache configuration.
///
/// # Environment Variables
///
/// - `REDIS_HOST` - Redis host; enables the cache probe
/// - `REDIS_PORT` - Redis port (default: 6379)
/// - `REDIS_USERNAME` / `REDIS_PASSWORD` - Optional credentials
/// - `REDIS_DATABASE` - Logical database index
/// - `CACHE_NAMESPACE` - Key prefix
/// - `CACHE_TTL_SECS` - Default entry lifetime
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis host.
    #[arg(long, env = "REDIS_HOST")]
    pub redis_host: Option<String>,

    /// Redis port.
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Redis username.
    #[arg(long, env = "REDIS_USERNAME")]
    pub redis_username: Option<String>,

    /// Redis password.
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub redis_password: Option<String>,

    /// Redis logical database index.
    #[arg(long, env = "REDIS_DATABASE")]
    pub redis_database: Option<i64>,

    /// Prefix applied to every cache key.
    #[arg(long, env = "CACHE_NAMESPACE")]
    pub cache_namespace: Option<String>,

    /// Default entry lifetime in seconds.
    #[arg(long, env = "CACHE_TTL_SECS")]
    pub cache_ttl_secs: Option<u64>,
}

fn default_redis_port() -> u16 {
    6379
}

impl CacheConfig {
    /// Builds the cache context, or `None` when no Redis host is configured.
    pub fn context(&self, base: DatasourceContext) -> Option<CacheContext> {
        let host = self.redis_host.as_ref()?;

        let mut options = RedisOptions::new(host.clone(), self.redis_port).with_credentials(
            self.redis_username.clone().unwrap_or_default(),
            self.redis_password.clone().unwrap_or_default(),
        );
        if let Some(database) = self.redis_database {
            options = options.with_database(database);
        }

        let mut context = CacheContext::redis(base, options);
        if let Some(namespace) = &self.cache_namespace {
            context = context.with_namespace(namespace.clone());
        }
        if let Some(ttl) = self.cache_ttl_secs {
            context = context.with_ttl_default_seconds(ttl);
        }
        Some(context)
    }
}

/// NATS broker configuration.
///
/// # Environment Variables
///
/// - `NATS_SERVERS` - Comma-separated server URLs; enables the event probe
/// - `NATS_CLIENT_ID` - Connection name (default: the service name)
/// - `NATS_USER` / `NATS_PASSWORD` - User and password credentials
/// - `NATS_TOKEN` - Token credentials (ignored when a user is set)
/// - `NATS_MAX_RECONNECTS` - Reconnect limit, 0 for unlimited
/// - `NATS_CONNECT_TIMEOUT_MS` - Initial connection deadline
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct EventConfig {
    /// Comma-separated NATS server URLs.
    #[arg(long, env = "NATS_SERVERS")]
    pub nats_servers: Option<String>,

    /// Connection name reported to the server.
    #[arg(long, env = "NATS_CLIENT_ID")]
    pub nats_client_id: Option<String>,

    /// NATS user.
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password.
    #[arg(long, env = "NATS_PASSWORD", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub nats_password: Option<String>,

    /// NATS authentication token.
    #[arg(long, env = "NATS_TOKEN", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub nats_token: Option<String>,

    /// Maximum reconnection attempts, 0 for unlimited.
    #[arg(long, env = "NATS_MAX_RECONNECTS")]
    pub nats_max_reconnects: Option<usize>,

    /// Initial connection deadline in milliseconds.
    #[arg(long, env = "NATS_CONNECT_TIMEOUT_MS")]
    pub nats_connect_timeout_ms: Option<u64>,
}

impl EventConfig {
    /// Builds the event context, or `None` when no servers are configured.
    pub fn context(&self, base: DatasourceContext, service_name: &str) -> Option<EventContext> {
        let servers = self.nats_servers.as_deref()?;

        let mut options = NatsOptions::from_server_list(servers);
        let credentials = match (&self.nats_user, &self.nats_token) {
            (Some(user), _) => Some(NatsCredentials::user_password(
                user.clone(),
                self.nats_password.clone().unwrap_or_default(),
            )),
            (None, Some(token)) => Some(NatsCredentials::token(token.clone())),
            (None, None) => None,
        };
        if let Some(credentials) = credentials {
            options = options.with_credentials(credentials);
        }
        if let Some(max_reconnects) = self.nats_max_reconnects {
            options = options.with_max_reconnects(max_reconnects);
        }
        if let Some(timeout_ms) = self.nats_connect_timeout_ms {
            options = options.with_connect_timeout(Duration::from_millis(timeout_ms));
        }

        let client_id = self
            .nats_client_id
            .clone()
            .unwrap_or_else(|| service_name.to_owned());
        Some(EventContext::nats(base, client_id, options))
    }
}

/// PostgreSQL configuration.
///
/// # Environment Variables
///
/// - `DATABASE_URL` - Connection string; enables the database probe
/// - `DATABASE_POOL_SIZE` - Maximum pooled connections (default: 10)
/// - `DATABASE_SSL` - Prefer TLS connections
/// - `DATABASE_LOG_STATEMENTS` - Log every statement at debug level
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub database_url: Option<String>,

    /// Maximum number of pooled connections.
    #[arg(long, env = "DATABASE_POOL_SIZE")]
    pub database_pool_size: Option<u32>,

    /// Prefer TLS connections.
    #[arg(long, env = "DATABASE_SSL", default_value_t = false)]
    #[serde(default)]
    pub database_ssl: bool,

    /// Log every statement at debug level.
    #[arg(long, env = "DATABASE_LOG_STATEMENTS", default_value_t = false)]
    #[serde(default)]
    pub database_log_statements: bool,
}

impl DatabaseConfig {
    /// Builds the relational context, or `None` when no URL is configured.
    pub fn context(&self, base: DatasourceContext) -> Option<RelationalContext> {
        let url = self.database_url.as_ref()?;

        let mut context = RelationalContext::postgres(base)
            .with_connection_string(url.clone())
            .with_ssl(self.database_ssl)
            .with_logging(self.database_log_statements);
        if let Some(pool_size) = self.database_pool_size {
            context = context.with_pool_size(pool_size);
        }
        Some(context)
    }
}

/// HTTP API configuration.
///
/// # Environment Variables
///
/// - `REST_BASE_URL` - API base URL; enables the REST probe
/// - `REST_TOKEN` - Bearer token
/// - `REST_HEADERS` - Comma-separated `name=value` pairs
/// - `REST_HEALTH_PATH` - Path probed with `GET` (default: health)
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL of the API.
    #[arg(long, env = "REST_BASE_URL")]
    pub rest_base_url: Option<String>,

    /// Bearer token sent with every request.
    #[arg(long, env = "REST_TOKEN", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub rest_token: Option<String>,

    /// Extra headers as `name=value` pairs.
    #[arg(long, env = "REST_HEADERS", value_delimiter = ',')]
    #[serde(default)]
    pub rest_headers: Vec<String>,

    /// Path probed with `GET`, relative to the base URL.
    #[arg(long, env = "REST_HEALTH_PATH", default_value = "health")]
    #[serde(default)]
    pub rest_health_path: String,
}

impl RestConfig {
    /// Builds the REST context, or `None` when no base URL is configured.
    pub fn context(
        &self,
        base: DatasourceContext,
        service_name: &str,
    ) -> AnyhowResult<Option<RestContext>> {
        let Some(base_url) = &self.rest_base_url else {
            return Ok(None);
        };

        let mut context =
            RestContext::new(base, base_url.clone()).with_service_name(service_name.to_owned());
        if let Some(token) = &self.rest_token {
            context = context.with_token(token.clone());
        }
        for header in &self.rest_headers {
            let (name, value) = header
                .split_once('=')
                .ok_or_else(|| anyhow!("header '{header}' is not a name=value pair"))?;
            context = context.with_header(name.trim(), value.trim());
        }
        Ok(Some(context))
    }
}

#[cfg(test)]
mod tests {
    use conduit_core::context::{BrokerOptions, CacheProvider};

    use super::*;

    fn base() -> DatasourceContext {
        DatasourceContext::new("billing")
    }

    #[test]
    fn test_groups_are_optional() {
        assert!(CacheConfig::default().context(base()).is_none());
        assert!(EventConfig::default().context(base(), "billing").is_none());
        assert!(DatabaseConfig::default().context(base()).is_none());
        assert!(RestConfig::default().context(base(), "billing").unwrap().is_none());
    }

    #[test]
    fn test_cache_context() {
        let config = CacheConfig {
            redis_host: Some("cache.internal".to_owned()),
            redis_port: 6380,
            redis_password: Some("secret".to_owned()),
            cache_namespace: Some("billing".to_owned()),
            cache_ttl_secs: Some(60),
            ..CacheConfig::default()
        };
        let context = config.context(base()).unwrap();

        let CacheProvider::Redis(options) = context.provider() else {
            panic!("expected redis provider");
        };
        assert_eq!(options.host, "cache.internal");
        assert_eq!(options.port, 6380);
        assert_eq!(options.username, None);
        assert_eq!(options.password.as_deref(), Some("secret"));
        assert_eq!(context.namespaced_key("k"), "billing:k");
        assert_eq!(context.resolve_ttl(None), 60);
    }

    #[test]
    fn test_event_context_prefers_user_credentials() {
        let config = EventConfig {
            nats_servers: Some("nats://a:4222, nats://b:4222".to_owned()),
            nats_user: Some("svc".to_owned()),
            nats_password: Some("pw".to_owned()),
            nats_token: Some("ignored".to_owned()),
            ..EventConfig::default()
        };
        let context = config.context(base(), "billing").unwrap();

        assert_eq!(context.client_id(), "billing");
        let BrokerOptions::Nats(options) = context.broker() else {
            panic!("expected nats broker");
        };
        assert_eq!(options.servers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(
            options.credentials,
            Some(NatsCredentials::user_password("svc", "pw"))
        );
    }

    #[test]
    fn test_rest_headers_are_parsed() {
        let config = RestConfig {
            rest_base_url: Some("https://api.internal".to_owned()),
            rest_headers: vec!["x-tenant = acme".to_owned()],
            ..RestConfig::default()
        };
        let context = config.context(base(), "billing").unwrap().unwrap();
        assert_eq!(context.headers().get("x-tenant").map(String::as_str), Some("acme"));

        let config = RestConfig {
            rest_headers: vec!["broken".to_owned()],
            ..config
        };
        assert!(config.context(base(), "billing").is_err());
    }
}
