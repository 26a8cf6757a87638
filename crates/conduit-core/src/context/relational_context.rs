//! Relational datasource context.

use std::fmt;

use derive_more::Deref;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::DatasourceContext;
use crate::{Error, Result};

/// Default connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Relational database engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RelationalKind {
    Mysql,
    Postgresql,
    Sqlite,
    Mssql,
}

impl RelationalKind {
    /// Returns the engine's conventional port.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::Mysql => Some(3306),
            Self::Postgresql => Some(5432),
            Self::Mssql => Some(1433),
            Self::Sqlite => None,
        }
    }
}

/// Context for relational datasources.
///
/// Either `connection_string` or the individual connection parameters are
/// used; the connection string wins when both are present.
///
/// Dereferences to the base [`DatasourceContext`].
#[derive(Clone, Deref)]
pub struct RelationalContext {
    #[deref]
    base: DatasourceContext,
    kind: RelationalKind,
    connection_string: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
    pool_size: Option<u32>,
    ssl: bool,
    enable_logging: bool,
}

impl RelationalContext {
    /// Create a new relational context.
    pub fn new(base: DatasourceContext, kind: RelationalKind) -> Self {
        Self {
            base,
            kind,
            connection_string: None,
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            pool_size: None,
            ssl: false,
            enable_logging: false,
        }
    }

    /// Create a new PostgreSQL context.
    pub fn postgres(base: DatasourceContext) -> Self {
        Self::new(base, RelationalKind::Postgresql)
    }

    /// Set the connection string.
    #[must_use]
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Enable or disable TLS.
    #[must_use]
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Enable or disable statement logging.
    #[must_use]
    pub fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }

    /// Returns the base context.
    #[inline]
    pub fn base(&self) -> &DatasourceContext {
        &self.base
    }

    /// Returns the database engine.
    #[inline]
    pub fn kind(&self) -> RelationalKind {
        self.kind
    }

    /// Returns the connection string.
    #[inline]
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// Returns the host, defaulting to `localhost`.
    #[inline]
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Returns the port, defaulting to the engine's conventional port.
    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.port.or(self.kind.default_port())
    }

    /// Returns the username.
    #[inline]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the password.
    #[inline]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns the database name.
    #[inline]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Returns the pool size, or the default if not set.
    #[inline]
    pub fn pool_size(&self) -> u32 {
        self.pool_size.unwrap_or(DEFAULT_POOL_SIZE)
    }

    /// Returns whether TLS is requested.
    #[inline]
    pub fn ssl(&self) -> bool {
        self.ssl
    }

    /// Returns whether statements are logged.
    #[inline]
    pub fn enable_logging(&self) -> bool {
        self.enable_logging
    }

    /// Validate the context.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if self.pool_size == Some(0) {
            return Err(Error::invalid_config("pool size must be greater than zero"));
        }
        if self.connection_string.is_none() && self.database.is_none() {
            return Err(Error::invalid_config(
                "either a connection string or a database name must be provided",
            ));
        }
        Ok(())
    }
}

impl AsRef<DatasourceContext> for RelationalContext {
    fn as_ref(&self) -> &DatasourceContext {
        &self.base
    }
}

impl fmt::Debug for RelationalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalContext")
            .field("base", &self.base)
            .field("kind", &self.kind)
            .field("has_connection_string", &self.connection_string.is_some())
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("ssl", &self.ssl)
            .field("enable_logging", &self.enable_logging)
            .finish_non_exhaustive()
    }
}
