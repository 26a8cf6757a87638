//! JSON HTTP API datasource.

use std::time::Instant;

use bytes::Bytes;
use conduit_core::context::RestContext;
use conduit_core::datasource::{Datasource, ExecutionExt};
use conduit_core::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::endpoint::{endpoint, header_map};
use crate::TRACING_TARGET_CLIENT;

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 1024;

/// HTTP API datasource.
///
/// Every request joins its path onto the context's base URL, carries the
/// bearer token and configured headers, and runs under the context's retry
/// policy with a fresh deadline per attempt. Cloning is cheap; clones share
/// the underlying connection pool.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    context: RestContext,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Creates a client for the API described by `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the base URL or a configured header
    /// is invalid, or if the HTTP client cannot be created.
    pub fn new(context: RestContext) -> Result<Self> {
        context.validate()?;
        header_map(context.headers())?;

        let user_agent = format!(
            "{}/{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            context.service_name()
        );
        let http = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to create HTTP client: {e}")))?;

        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            datasource = context.name(),
            base_url = context.base_url(),
            "Created REST client"
        );

        Ok(Self { http, context })
    }

    /// Sends a request and decodes the JSON response body as `T`.
    ///
    /// An empty response body decodes as JSON `null`, so `()` and `Option<_>`
    /// work for endpoints that return no content.
    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = endpoint(self.context.base_url(), path)?;
        let payload = body.map(serde_json::to_vec).transpose()?.map(Bytes::from);

        let method = &method;
        let url = &url;
        let payload = payload.as_ref();
        let bytes = self
            .run_resilient(move |_token| self.send_once(method, url, payload))
            .await?;

        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a `GET` request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    /// Sends a `POST` request with a JSON body.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Sends a `PUT` request with a JSON body.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Sends a `PATCH` request with a JSON body.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::DELETE, path, None).await
    }

    async fn send_once(&self, method: &Method, url: &Url, payload: Option<&Bytes>) -> Result<Bytes> {
        let name = self.context.name();
        let started_at = Instant::now();

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(header_map(self.context.headers())?);
        if let Some(token) = self.context.token() {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(payload.clone());
        }

        let response = request.send().await.map_err(|e| Error::request(name, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| Error::request(name, e))?;

        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            datasource = name,
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started_at.elapsed().as_millis(),
            "Request completed"
        );

        if !status.is_success() {
            let text: String = String::from_utf8_lossy(&body)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(Error::request_status(name, status.as_u16(), &text));
        }

        Ok(body)
    }
}

impl Datasource for RestClient {
    type Context = RestContext;

    fn context(&self) -> &Self::Context {
        &self.context
    }

    fn set_context(&mut self, context: Self::Context) {
        self.context = context;
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use axum::{Json, Router};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{delete, get, post};
    use conduit_core::context::{DatasourceContext, RetryPolicy};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/api")
    }

    fn client(base_url: &str, retries: u32, timeout: Duration) -> RestClient {
        let base = DatasourceContext::new("users-api")
            .with_timeout(timeout)
            .with_retry_policy(RetryPolicy::new(
                retries,
                Duration::from_millis(10),
                Duration::from_millis(20),
            ));
        RestClient::new(
            RestContext::new(base, base_url)
                .with_token("s3cret")
                .with_header("x-tenant", "acme"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_credentials_and_decodes() {
        let router = Router::new().route(
            "/api/users/{id}",
            get(|headers: HeaderMap| async move {
                let authorized = headers.get("authorization").is_some_and(|v| v == "Bearer s3cret")
                    && headers.get("x-tenant").is_some_and(|v| v == "acme");
                if authorized {
                    Json(json!({"id": 7, "name": "ada"})).into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let client = client(&serve(router).await, 1, Duration::from_secs(2));

        let user: User = client.get("/users/7").await.unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "ada".into()
            }
        );
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let router = Router::new().route(
            "/api/echo",
            post(|Json(body): Json<Value>| async move { Json(body) }),
        );
        let client = client(&serve(router).await, 1, Duration::from_secs(2));

        let echoed: Value = client.post("echo", &json!({"a": [1, 2]})).await.unwrap();
        assert_eq!(echoed, json!({"a": [1, 2]}));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new().route(
            "/api/flaky",
            get({
                let calls = calls.clone();
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response()
                    } else {
                        Json(json!({"ok": true})).into_response()
                    }
                }
            }),
        );
        let client = client(&serve(router).await, 3, Duration::from_secs(2));

        let body: Value = client.get("flaky").await.unwrap();
        assert_eq!(body, json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_status_exhausts_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new().route(
            "/api/missing",
            get({
                let calls = calls.clone();
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::NOT_FOUND, "no such user")
                }
            }),
        );
        let client = client(&serve(router).await, 2, Duration::from_secs(2));

        let err = client.get::<Value>("missing").await.unwrap_err();
        assert!(matches!(err, Error::RetryExhausted { attempts: 2, .. }));
        assert!(err.to_string().contains("HTTP 404: no such user"));
        let status = std::iter::successors(err.source(), |&e| e.source())
            .filter_map(|e| e.downcast_ref::<Error>())
            .find_map(|e| match e {
                Error::Request { status, .. } => *status,
                _ => None,
            });
        assert_eq!(status, Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_responses_time_out_per_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new().route(
            "/api/slow",
            get({
                let calls = calls.clone();
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Json(json!({}))
                }
            }),
        );
        let client = client(&serve(router).await, 2, Duration::from_millis(50));

        let err = client.get::<Value>("slow").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_body_decodes_as_unit() {
        let router = Router::new().route("/api/users/{id}", delete(|| async { StatusCode::NO_CONTENT }));
        let client = client(&serve(router).await, 1, Duration::from_secs(2));

        client.delete::<()>("users/7").await.unwrap();
        let nothing: Option<User> = client.delete("users/8").await.unwrap();
        assert!(nothing.is_none());
    }

    #[test]
    fn test_new_rejects_invalid_context() {
        let base = DatasourceContext::new("users-api");
        let err = RestClient::new(RestContext::new(base.clone(), "ftp://files")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let err = RestClient::new(
            RestContext::new(base, "https://api.internal").with_header("bad header", "x"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
