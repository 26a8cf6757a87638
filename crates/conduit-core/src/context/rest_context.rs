//! REST API datasource context.

use std::collections::BTreeMap;
use std::fmt;

use derive_more::Deref;

use super::DatasourceContext;
use crate::{Error, Result};

/// Context for HTTP API datasources.
///
/// Dereferences to the base [`DatasourceContext`].
#[derive(Clone, Deref)]
pub struct RestContext {
    #[deref]
    base: DatasourceContext,
    base_url: String,
    token: Option<String>,
    headers: BTreeMap<String, String>,
    service_name: Option<String>,
}

impl RestContext {
    /// Create a new REST context for the given base URL.
    pub fn new(base: DatasourceContext, base_url: impl Into<String>) -> Self {
        Self {
            base,
            base_url: base_url.into(),
            token: None,
            headers: BTreeMap::new(),
            service_name: None,
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the name of the remote service.
    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Returns the base context.
    #[inline]
    pub fn base(&self) -> &DatasourceContext {
        &self.base
    }

    /// Returns the base URL.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the bearer token.
    #[inline]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the extra headers.
    #[inline]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns the remote service name, falling back to the datasource name.
    #[inline]
    pub fn service_name(&self) -> &str {
        self.service_name.as_deref().unwrap_or(self.base.name())
    }

    /// Validate the context.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::invalid_config(format!(
                "invalid base URL: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

impl AsRef<DatasourceContext> for RestContext {
    fn as_ref(&self) -> &DatasourceContext {
        &self.base
    }
}

impl fmt::Debug for RestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestContext")
            .field("base", &self.base)
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("service_name", &self.service_name)
            .finish()
    }
}
