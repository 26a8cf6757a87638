//! Includes all callbacks and hooks for [`diesel`] and [`deadpool`].
//!
//! The pool hooks report broken connections through the datasource's context
//! logger. They only observe: broken connections are dropped by the pool's
//! recycle check, never reconnected here.

use std::time::Instant;

use conduit_core::context::DatasourceContext;
use deadpool::managed::{Hook, HookResult, Metrics};
use diesel::ConnectionResult;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError, PoolableConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use futures::FutureExt;
use futures::future::BoxFuture;
use url::Url;

use super::connection_url::masked;
use crate::TRACING_TARGET_CONNECTION;

type Manager = AsyncDieselConnectionManager<AsyncPgConnection>;

/// Custom setup procedure used to establish a new connection.
///
/// See [`ManagerConfig`] and [`SetupCallback`] for more details.
///
/// [`ManagerConfig`]: diesel_async::pooled_connection::ManagerConfig
/// [`SetupCallback`]: diesel_async::pooled_connection::SetupCallback
pub fn setup_callback<C>(addr: &str) -> BoxFuture<'_, ConnectionResult<C>>
where
    C: AsyncConnection + 'static,
{
    let start = Instant::now();
    let masked_addr = Url::parse(addr).map_or_else(|_| "<unparseable>".to_owned(), |url| masked(&url));

    tracing::debug!(
        target: TRACING_TARGET_CONNECTION,
        hook = "setup_callback",
        addr = %masked_addr,
        "Establishing new database connection"
    );

    async move {
        let result = C::establish(addr).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => tracing::debug!(
                target: TRACING_TARGET_CONNECTION,
                hook = "setup_callback",
                addr = %masked_addr,
                elapsed_ms = elapsed.as_millis(),
                "Database connection established"
            ),
            Err(err) => tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                hook = "setup_callback",
                addr = %masked_addr,
                elapsed_ms = elapsed.as_millis(),
                error = %err,
                "Failed to establish database connection"
            ),
        }

        result
    }
    .boxed()
}

/// Hook called after a new connection has been established.
pub fn post_create(context: DatasourceContext) -> Hook<Manager> {
    Hook::sync_fn(move |conn: &mut AsyncPgConnection, metrics: &Metrics| {
        if conn.is_broken() {
            context.warn("Connection is broken after creation");
        }

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            hook = "post_create",
            datasource = context.name(),
            created_at = ?metrics.created,
            "Connection created and added to pool"
        );

        HookResult::<PoolError>::Ok(())
    })
}

/// Hook called before an idle connection is handed out again.
pub fn pre_recycle(context: DatasourceContext) -> Hook<Manager> {
    Hook::sync_fn(move |conn: &mut AsyncPgConnection, metrics: &Metrics| {
        if conn.is_broken() {
            context.warn(format!(
                "Idle connection is broken before recycling (recycled {} times)",
                metrics.recycle_count
            ));
        }

        HookResult::<PoolError>::Ok(())
    })
}

/// Hook called after a connection has been recycled.
pub fn post_recycle(context: DatasourceContext) -> Hook<Manager> {
    Hook::sync_fn(move |conn: &mut AsyncPgConnection, metrics: &Metrics| {
        if conn.is_broken() {
            context.error(format!(
                "Connection is broken after recycling (recycled {} times)",
                metrics.recycle_count
            ));
        }

        tracing::trace!(
            target: TRACING_TARGET_CONNECTION,
            hook = "post_recycle",
            datasource = context.name(),
            recycle_count = metrics.recycle_count,
            "Connection recycled"
        );

        HookResult::<PoolError>::Ok(())
    })
}
