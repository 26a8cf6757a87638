//! Embedded migration execution.

use std::time::Instant;

use conduit_core::context::DatasourceContext;
use conduit_core::{Error, Result};
use diesel::migration::{self, Migration, MigrationSource};
use diesel::pg::Pg;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};
use tokio::task::spawn_blocking;

use super::PooledConnection;
use crate::TRACING_TARGET_MIGRATION;

/// Migration source borrowing a `static` or promoted `const` migration set.
#[derive(Clone, Copy)]
struct StaticMigrations(&'static EmbeddedMigrations);

impl MigrationSource<Pg> for StaticMigrations {
    fn migrations(&self) -> migration::Result<Vec<Box<dyn Migration<Pg>>>> {
        MigrationSource::<Pg>::migrations(self.0)
    }
}

/// Applies every pending migration of `migrations` on `conn`.
///
/// Returns the versions that were applied, in order. The migration harness is
/// synchronous, so it runs on the blocking thread pool.
#[tracing::instrument(skip_all, target = TRACING_TARGET_MIGRATION, fields(datasource = context.name()))]
pub async fn run_pending_migrations(
    context: &DatasourceContext,
    conn: PooledConnection,
    migrations: &'static EmbeddedMigrations,
) -> Result<Vec<String>> {
    let start = Instant::now();
    let mut conn: AsyncConnectionWrapper<PooledConnection> = conn.into();

    let versions = spawn_blocking(move || {
        conn.run_pending_migrations(StaticMigrations(migrations)).map(|versions| {
            versions
                .into_iter()
                .map(|version| version.to_string())
                .collect::<Vec<_>>()
        })
    })
    .await
    .map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_MIGRATION,
            error = %err,
            "Migration task panicked"
        );
        Error::connection_with(context.name(), err)
    })?
    .map_err(|err| {
        context.error(format!("Database migration failed: {err}"));
        Error::connection(context.name(), format!("migration failed: {err}"))
    })?;

    let duration = start.elapsed();
    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?duration,
        migrations_count = versions.len(),
        "Database migrations completed"
    );

    if versions.is_empty() {
        context.debug("Database schema is up to date");
    } else {
        context.info(format!(
            "Applied {} migration(s): {}",
            versions.len(),
            versions.join(", ")
        ));
    }

    Ok(versions)
}
