use std::time::Duration;

use async_nats::{ConnectOptions, Event};
use conduit_core::context::{DatasourceContext, NatsCredentials, NatsOptions};

use crate::TRACING_TARGET_CONNECTION;

/// Base delay between reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_millis(250);

/// Upper bound for the delay between reconnection attempts.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Builds the `async-nats` connect options for a datasource.
///
/// The connection is named after `client_id`. Connection events are
/// forwarded to the context logger; reconnection uses exponential backoff
/// capped at thirty seconds.
pub fn connect_options(
    context: &DatasourceContext,
    client_id: &str,
    options: &NatsOptions,
) -> ConnectOptions {
    let mut connect_opts = match &options.credentials {
        Some(NatsCredentials::UserPassword { user, pass }) => {
            ConnectOptions::with_user_and_password(user.clone(), pass.clone())
        }
        Some(NatsCredentials::Token { token }) => ConnectOptions::with_token(token.clone()),
        None => ConnectOptions::new(),
    };

    connect_opts = connect_opts
        .name(client_id)
        .max_reconnects(options.max_reconnects_option())
        .reconnect_delay_callback(reconnect_delay);

    if let Some(timeout) = options.connect_timeout {
        connect_opts = connect_opts.connection_timeout(timeout);
    }

    let context = context.clone();
    connect_opts.event_callback(move |event| {
        let context = context.clone();
        async move {
            tracing::debug!(
                target: TRACING_TARGET_CONNECTION,
                datasource = context.name(),
                event = %event,
                "NATS connection event"
            );
            match event {
                Event::Connected => context.info("NATS connection established"),
                other => context.warn(format!("NATS connection event: {other}")),
            }
        }
    })
}

fn reconnect_delay(attempts: usize) -> Duration {
    let exponent = u32::try_from(attempts.min(16)).unwrap_or(16);
    RECONNECT_DELAY
        .saturating_mul(2_u32.saturating_pow(exponent))
        .min(MAX_RECONNECT_DELAY)
}
