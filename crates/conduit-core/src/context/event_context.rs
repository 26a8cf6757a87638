//! Event datasource context.

use std::fmt;
use std::time::Duration;

use derive_more::Deref;
use serde::{Deserialize, Serialize};
use url::Url;

use super::DatasourceContext;
use crate::{Error, Result};

/// Default NATS server used when none is configured.
pub const DEFAULT_NATS_SERVER: &str = "nats://localhost:4222";

/// Default number of NATS reconnection attempts.
pub const DEFAULT_NATS_MAX_RECONNECTS: usize = 10;

const NATS_SCHEMES: [&str; 4] = ["nats", "tls", "ws", "wss"];

/// Returns whether `server` is a NATS server address: a `nats`, `tls`, `ws`
/// or `wss` URL with a host, or a bare `host[:port]`.
pub fn is_valid_nats_server(server: &str) -> bool {
    let parsed = if server.contains("://") {
        Url::parse(server)
    } else {
        Url::parse(&format!("nats://{server}"))
    };

    parsed.is_ok_and(|url| {
        NATS_SCHEMES.contains(&url.scheme()) && url.host_str().is_some_and(|host| !host.is_empty())
    })
}

/// NATS authentication credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NatsCredentials {
    /// Username and password authentication
    UserPassword {
        /// Username for authentication
        user: String,
        /// Password for authentication
        pass: String,
    },
    /// Token authentication
    Token {
        /// Token string
        token: String,
    },
}

impl NatsCredentials {
    /// Create user/password credentials.
    pub fn user_password(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self::UserPassword {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Create token-based credentials.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }
}

impl fmt::Debug for NatsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPassword { user, .. } => f
                .debug_struct("UserPassword")
                .field("user", user)
                .finish_non_exhaustive(),
            Self::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
        }
    }
}

/// Connection options for a NATS broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsOptions {
    /// Server URLs
    pub servers: Vec<String>,
    /// Authentication credentials
    pub credentials: Option<NatsCredentials>,
    /// Maximum number of reconnection attempts (0 = unlimited)
    pub max_reconnects: Option<usize>,
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
}

impl Default for NatsOptions {
    fn default() -> Self {
        Self {
            servers: vec![DEFAULT_NATS_SERVER.to_owned()],
            credentials: None,
            max_reconnects: None,
            connect_timeout: None,
        }
    }
}

impl NatsOptions {
    /// Create options from a comma-separated server list.
    pub fn from_server_list(servers: &str) -> Self {
        let servers: Vec<String> = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        if servers.is_empty() {
            Self::default()
        } else {
            Self {
                servers,
                ..Self::default()
            }
        }
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: NatsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set maximum reconnection attempts (0 for unlimited).
    #[must_use]
    pub fn with_max_reconnects(mut self, max_reconnects: usize) -> Self {
        self.max_reconnects = Some(max_reconnects);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Returns the max reconnects as Option (0 means unlimited).
    #[inline]
    pub fn max_reconnects_option(&self) -> Option<usize> {
        let max = self.max_reconnects.unwrap_or(DEFAULT_NATS_MAX_RECONNECTS);
        if max == 0 { None } else { Some(max) }
    }
}

/// Connection options for a Kafka cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaOptions {
    /// Bootstrap broker addresses
    pub brokers: Vec<String>,
    /// Client id announced to the cluster
    pub client_id: String,
}

/// Broker an event datasource talks to, with the options its protocol needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "broker", rename_all = "lowercase")]
pub enum BrokerOptions {
    Nats(NatsOptions),
    Kafka(KafkaOptions),
    Redis,
    Sns,
    Sqs,
    Pubsub,
    Mock,
}

impl BrokerOptions {
    /// Returns the broker name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nats(_) => "nats",
            Self::Kafka(_) => "kafka",
            Self::Redis => "redis",
            Self::Sns => "sns",
            Self::Sqs => "sqs",
            Self::Pubsub => "pubsub",
            Self::Mock => "mock",
        }
    }
}

/// Context for event datasources.
///
/// Dereferences to the base [`DatasourceContext`].
#[derive(Debug, Clone, Deref)]
pub struct EventContext {
    #[deref]
    base: DatasourceContext,
    client_id: String,
    broker: BrokerOptions,
}

impl EventContext {
    /// Create a new event context.
    pub fn new(base: DatasourceContext, client_id: impl Into<String>, broker: BrokerOptions) -> Self {
        Self {
            base,
            client_id: client_id.into(),
            broker,
        }
    }

    /// Create a new NATS event context.
    pub fn nats(base: DatasourceContext, client_id: impl Into<String>, options: NatsOptions) -> Self {
        Self::new(base, client_id, BrokerOptions::Nats(options))
    }

    /// Create a new in-memory event context.
    pub fn mock(base: DatasourceContext, client_id: impl Into<String>) -> Self {
        Self::new(base, client_id, BrokerOptions::Mock)
    }

    /// Returns the base context.
    #[inline]
    pub fn base(&self) -> &DatasourceContext {
        &self.base
    }

    /// Returns the client id.
    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the broker options.
    #[inline]
    pub fn broker(&self) -> &BrokerOptions {
        &self.broker
    }

    /// Validate the context.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.client_id.trim().is_empty() {
            return Err(Error::invalid_config("client id cannot be empty"));
        }
        if let BrokerOptions::Nats(options) = &self.broker {
            if options.servers.is_empty() {
                return Err(Error::invalid_config(
                    "at least one NATS server URL must be provided",
                ));
            }
            if let Some(server) = options.servers.iter().find(|s| !is_valid_nats_server(s)) {
                return Err(Error::invalid_config(format!(
                    "invalid NATS server URL format: {server}"
                )));
            }
        }
        Ok(())
    }
}

impl AsRef<DatasourceContext> for EventContext {
    fn as_ref(&self) -> &DatasourceContext {
        &self.base
    }
}
