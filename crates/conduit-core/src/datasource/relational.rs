use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Datasource;
use crate::Result;
use crate::context::RelationalContext;

/// A single result row keyed by column name.
pub type Row = Map<String, Value>;

/// A positional SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Relational database capability.
///
/// Unlike the cache, every failure is propagated to the caller.
#[async_trait]
pub trait RelationalDatasource: Datasource<Context = RelationalContext> {
    /// Handle to the live connection pool.
    type Handle: Clone + Send + Sync;

    /// Returns `true` if a trivial round-trip query succeeds.
    async fn ping(&self) -> bool;

    /// Initializes the connection pool, or returns the existing handle.
    async fn connect(&self) -> Result<Self::Handle>;

    /// Executes a parameterized query and returns its rows.
    ///
    /// Fails with [`Error::Query`](crate::Error::Query) when the database
    /// rejects the statement.
    async fn query_raw(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>>;

    /// Executes a parameterized statement and returns the affected row count.
    ///
    /// Runs once under the context's timeout and is never retried; callers
    /// that know a write is idempotent can wrap it in
    /// [`ExecutionExt::run_with_retry`](super::ExecutionExt::run_with_retry).
    async fn execute_raw(&self, sql: &str, params: &[SqlParam]) -> Result<u64>;

    /// Tears down the pool. No-op when not initialized.
    async fn close(&self) -> Result<()>;
}

/// Typed convenience methods over [`RelationalDatasource`].
pub trait RelationalDatasourceExt: RelationalDatasource {
    /// Executes a query and decodes every row as `T`.
    fn query_as<T>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Executes a query and decodes the first row as `T`, if any.
    fn query_opt_as<T>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;
}

impl<R: RelationalDatasource + ?Sized> RelationalDatasourceExt for R {
    fn query_as<T>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            let rows = self.query_raw(sql, params).await?;
            let decoded = rows
                .into_iter()
                .map(|row| serde_json::from_value(Value::Object(row)))
                .collect::<Result<Vec<T>, _>>()?;
            Ok(decoded)
        }
    }

    fn query_opt_as<T>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            let rows = self.query_raw(sql, params).await?;
            let first = rows
                .into_iter()
                .next()
                .map(|row| serde_json::from_value(Value::Object(row)))
                .transpose()?;
            Ok(first)
        }
    }
}
