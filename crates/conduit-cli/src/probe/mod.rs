//! Datasource construction, health probing and shutdown.

mod checks;
mod report;

use anyhow::Context;
use conduit_core::datasource::{CacheDatasource, EventDatasource, RelationalDatasource};
use conduit_nats::NatsEvents;
use conduit_postgres::PgDatasource;
use conduit_redis::RedisCache;
use conduit_reqwest::RestClient;
pub use report::ProbeReport;

use self::checks::{check_cache, check_database, check_events, check_rest};
use crate::TRACING_TARGET_SHUTDOWN;
use crate::config::Cli;

/// Every datasource configured on the command line.
#[derive(Debug)]
pub struct Datasources {
    service: String,
    environment: String,
    request_id: String,
    cache: Option<RedisCache>,
    events: Option<NatsEvents>,
    database: Option<PgDatasource>,
    rest: Option<(RestClient, String)>,
}

impl Datasources {
    /// Builds the configured datasources without connecting them.
    pub fn from_cli(cli: &Cli, request_id: &str) -> anyhow::Result<Self> {
        let service = &cli.service;
        let name = service.service_name.as_str();

        let cache = cli
            .cache
            .context(service.base_context("cache", request_id))
            .map(RedisCache::new);
        let events = cli
            .events
            .context(service.base_context("events", request_id), name)
            .map(NatsEvents::new);
        let database = cli
            .database
            .context(service.base_context("database", request_id))
            .map(PgDatasource::new);
        let rest = cli
            .rest
            .context(service.base_context("rest", request_id), name)?
            .map(RestClient::new)
            .transpose()
            .context("invalid REST configuration")?
            .map(|client| (client, cli.rest.rest_health_path.clone()));

        Ok(Self {
            service: name.to_owned(),
            environment: service.environment.to_string(),
            request_id: request_id.to_owned(),
            cache,
            events,
            database,
            rest,
        })
    }

    /// Returns whether no datasource is configured.
    pub fn is_empty(&self) -> bool {
        self.cache.is_none() && self.events.is_none() && self.database.is_none() && self.rest.is_none()
    }

    /// Connects and checks every configured datasource concurrently.
    pub async fn probe(&self) -> ProbeReport {
        let (cache, events, database, rest) = tokio::join!(
            async {
                match &self.cache {
                    Some(cache) => Some(check_cache(cache).await),
                    None => None,
                }
            },
            async {
                match &self.events {
                    Some(events) => Some(check_events(events).await),
                    None => None,
                }
            },
            async {
                match &self.database {
                    Some(database) => Some(check_database(database).await),
                    None => None,
                }
            },
            async {
                match &self.rest {
                    Some((client, path)) => Some(check_rest(client, path).await),
                    None => None,
                }
            },
        );

        let checks = [cache, events, database, rest].into_iter().flatten().collect();
        ProbeReport::new(&self.service, &self.environment, &self.request_id, checks)
    }

    /// Disconnects every datasource. Failures are logged, not returned.
    pub async fn shutdown(&self) {
        if let Some(cache) = &self.cache
            && let Err(err) = cache.disconnect().await
        {
            log_shutdown_failure("cache", &err);
        }
        if let Some(events) = &self.events
            && let Err(err) = events.disconnect().await
        {
            log_shutdown_failure("events", &err);
        }
        if let Some(database) = &self.database
            && let Err(err) = database.close().await
        {
            log_shutdown_failure("database", &err);
        }

        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            service = %self.service,
            "Datasources shut down"
        );
    }
}

fn log_shutdown_failure(kind: &str, err: &conduit_core::Error) {
    tracing::warn!(
        target: TRACING_TARGET_SHUTDOWN,
        kind,
        error = %err,
        "Failed to shut down datasource"
    );
}
