use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::context::RelationalContext;
use crate::datasource::{Datasource, ExecutionExt, RelationalDatasource, Row, SqlParam};
use crate::{Error, Result};

/// Scripted outcome of the next statement.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    Rows(Vec<Row>),
    Affected(u64),
    Failure(String),
}

impl MockResponse {
    /// Builds a `Rows` response from a JSON array of objects.
    ///
    /// Array elements that are not objects are skipped.
    pub fn json_rows(value: Value) -> Self {
        let rows = match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Self::Rows(rows)
    }
}

/// Handle returned by [`MockRelational::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockConnection {
    /// Sequence number of the pool initialization that produced this handle.
    pub generation: u32,
}

#[derive(Debug, Default)]
struct State {
    connection: Option<MockConnection>,
    generations: u32,
    responses: VecDeque<MockResponse>,
    statements: Vec<(String, Vec<SqlParam>)>,
}

/// In-memory [`RelationalDatasource`] driven by scripted responses.
///
/// Every executed statement is recorded. Statements with no scripted response
/// return no rows. Queries run under the context's retry and timeout policy,
/// so a scripted failure followed by rows exercises the retry path.
#[derive(Debug)]
pub struct MockRelational {
    context: RelationalContext,
    state: Mutex<State>,
}

impl MockRelational {
    /// Creates a store with no scripted responses.
    pub fn new(context: RelationalContext) -> Self {
        Self {
            context,
            state: Mutex::new(State::default()),
        }
    }

    /// Queues the outcome of a future statement.
    pub async fn push_response(&self, response: MockResponse) {
        self.state.lock().await.responses.push_back(response);
    }

    /// Returns every executed statement with its parameters.
    pub async fn statements(&self) -> Vec<(String, Vec<SqlParam>)> {
        self.state.lock().await.statements.clone()
    }

    /// Returns how many times the pool was initialized.
    pub async fn generations(&self) -> u32 {
        self.state.lock().await.generations
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<MockResponse> {
        let mut state = self.state.lock().await;
        if state.connection.is_none() {
            return Err(Error::not_connected(self.context.name()));
        }

        state.statements.push((sql.to_owned(), params.to_vec()));
        match state.responses.pop_front() {
            Some(MockResponse::Failure(message)) => Err(Error::query(self.context.name(), message)),
            Some(response) => Ok(response),
            None => Ok(MockResponse::Rows(Vec::new())),
        }
    }

    fn log_statement(&self, sql: &str, params: &[SqlParam]) {
        if self.context.enable_logging() {
            self.context
                .debug(format!("Executing statement: {sql} with {} params", params.len()));
        }
    }

    fn statement_failed(&self, err: Error) -> Error {
        self.context.error(format!("Statement failed: {err}"));
        Error::query(self.context.name(), err)
    }

    async fn execute_resilient(&self, sql: &str, params: &[SqlParam]) -> Result<MockResponse> {
        self.log_statement(sql, params);
        self.run_resilient(move |_token| async move { self.execute(sql, params).await })
            .await
            .map_err(|err| self.statement_failed(err))
    }

    async fn execute_once(&self, sql: &str, params: &[SqlParam]) -> Result<MockResponse> {
        self.log_statement(sql, params);
        self.run_with_timeout(move |_token| async move { self.execute(sql, params).await })
            .await
            .map_err(|err| self.statement_failed(err))
    }
}

impl Datasource for MockRelational {
    type Context = RelationalContext;

    fn context(&self) -> &Self::Context {
        &self.context
    }

    fn set_context(&mut self, context: Self::Context) {
        self.context = context;
    }
}

#[async_trait]
impl RelationalDatasource for MockRelational {
    type Handle = MockConnection;

    async fn ping(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    async fn connect(&self) -> Result<Self::Handle> {
        let mut state = self.state.lock().await;
        if let Some(connection) = state.connection {
            return Ok(connection);
        }

        state.generations += 1;
        let connection = MockConnection {
            generation: state.generations,
        };
        state.connection = Some(connection);
        self.context.info("Initialized in-memory relational store");
        Ok(connection)
    }

    async fn query_raw(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        match self.execute_resilient(sql, params).await? {
            MockResponse::Rows(rows) => Ok(rows),
            MockResponse::Affected(_) | MockResponse::Failure(_) => Ok(Vec::new()),
        }
    }

    async fn execute_raw(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        match self.execute_once(sql, params).await? {
            MockResponse::Affected(count) => Ok(count),
            MockResponse::Rows(rows) => Ok(rows.len() as u64),
            MockResponse::Failure(_) => Ok(0),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.state.lock().await.connection.take().is_some() {
            self.context.info("Closed in-memory relational store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::context::{DatasourceContext, RetryPolicy};
    use crate::datasource::RelationalDatasourceExt;

    #[derive(Debug, PartialEq, Deserialize)]
    struct User {
        id: i64,
        email: String,
    }

    fn store() -> MockRelational {
        let base = DatasourceContext::new("users-db").with_retry_policy(RetryPolicy::new(
            3,
            Duration::from_millis(100),
            Duration::from_millis(2000),
        ));
        MockRelational::new(RelationalContext::postgres(base).with_database("users"))
    }

    #[tokio::test]
    async fn test_close_twice() {
        let db = store();
        db.close().await.unwrap();

        db.connect().await.unwrap();
        db.close().await.unwrap();
        db.close().await.unwrap();
        assert!(!db.ping().await);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let db = store();
        let first = db.connect().await.unwrap();
        let second = db.connect().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.generations().await, 1);
        assert!(db.ping().await);
    }

    #[tokio::test]
    async fn test_query_as_decodes_rows() {
        let db = store();
        db.connect().await.unwrap();
        db.push_response(MockResponse::json_rows(json!([
            {"id": 1, "email": "a@example.com"},
            {"id": 2, "email": "b@example.com"},
        ])))
        .await;

        let users: Vec<User> = db
            .query_as("SELECT id, email FROM users WHERE id > $1", &[0_i64.into()])
            .await
            .unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[1].email, "b@example.com");
        assert_eq!(
            db.statements().await,
            vec![(
                "SELECT id, email FROM users WHERE id > $1".to_owned(),
                vec![SqlParam::Int(0)]
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let db = store();
        db.connect().await.unwrap();
        db.push_response(MockResponse::Failure("connection reset".into())).await;
        db.push_response(MockResponse::Failure("connection reset".into())).await;
        db.push_response(MockResponse::json_rows(json!([{"answer": 42}]))).await;

        let rows = db.query_raw("SELECT 42 AS answer", &[]).await.unwrap();

        assert_eq!(rows[0]["answer"], json!(42));
        assert_eq!(db.statements().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_is_query_error() {
        let db = store();
        db.connect().await.unwrap();
        for _ in 0..3 {
            db.push_response(MockResponse::Failure("syntax error".into())).await;
        }

        let err = db.query_raw("SELEC 1", &[]).await.unwrap_err();

        assert!(matches!(err, Error::Query { .. }));
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("syntax error"));
    }

    #[tokio::test]
    async fn test_execute_raw_returns_affected() {
        let db = store();
        db.connect().await.unwrap();
        db.push_response(MockResponse::Affected(4)).await;

        let affected = db
            .execute_raw("DELETE FROM sessions WHERE expired", &[])
            .await
            .unwrap();
        assert_eq!(affected, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_not_retried() {
        let db = store();
        db.connect().await.unwrap();
        db.push_response(MockResponse::Failure("connection reset".into())).await;
        db.push_response(MockResponse::Affected(1)).await;

        let err = db
            .execute_raw("INSERT INTO users (email) VALUES ($1)", &["a@example.com".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Query { .. }));
        assert!(!err.to_string().contains("attempts"));
        assert_eq!(db.statements().await.len(), 1);
    }
}
