//! Per-capability health checks.

use std::future::Future;
use std::time::Instant;

use conduit_core::Result;
use conduit_core::datasource::{
    CacheDatasource, Datasource, EventDatasource, RelationalDatasource,
};
use conduit_reqwest::RestClient;
use serde_json::Value;

use super::report::{CheckReport, Status};
use crate::TRACING_TARGET_PROBE;

/// Connects the cache and checks it answers `PING`.
pub async fn check_cache<C: CacheDatasource + ?Sized>(cache: &C) -> CheckReport {
    timed(cache.name(), "cache", async {
        cache.connect().await?;
        Ok(cache.ping().await)
    })
    .await
}

/// Connects the broker and checks the connection is live.
pub async fn check_events<E: EventDatasource + ?Sized>(events: &E) -> CheckReport {
    timed(events.name(), "events", async {
        events.connect().await?;
        Ok(events.is_healthy().await)
    })
    .await
}

/// Initializes the pool and checks a trivial query succeeds.
pub async fn check_database<R: RelationalDatasource + ?Sized>(database: &R) -> CheckReport {
    timed(database.name(), "database", async {
        database.connect().await?;
        Ok(database.ping().await)
    })
    .await
}

/// Sends `GET path` and checks the API answers with a success status.
pub async fn check_rest(client: &RestClient, path: &str) -> CheckReport {
    timed(client.name(), "rest", async {
        client.get::<Value>(path).await?;
        Ok(true)
    })
    .await
}

async fn timed<F>(name: &str, kind: &'static str, check: F) -> CheckReport
where
    F: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let outcome = check.await;
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (status, error) = match outcome {
        Ok(true) => (Status::Healthy, None),
        Ok(false) => (Status::Unhealthy, Some("health check failed".to_owned())),
        Err(err) => (Status::Unhealthy, Some(err.to_string())),
    };

    match &error {
        None => tracing::info!(
            target: TRACING_TARGET_PROBE,
            datasource = name,
            kind,
            latency_ms,
            "Datasource healthy"
        ),
        Some(error) => tracing::warn!(
            target: TRACING_TARGET_PROBE,
            datasource = name,
            kind,
            latency_ms,
            error = %error,
            "Datasource unhealthy"
        ),
    }

    CheckReport {
        name: name.to_owned(),
        kind,
        status,
        latency_ms,
        error,
    }
}
