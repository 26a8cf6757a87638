//! Signal handling for watch mode.

use std::fmt;
use std::io;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::TRACING_TARGET_SHUTDOWN;

/// Signal that ended a watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Resolves with the first of SIGINT (Ctrl+C) or SIGTERM.
///
/// A listener that cannot be installed is logged and never resolves, so the
/// other one still works.
pub async fn stop_signal() -> StopSignal {
    let interrupt = async {
        let installed = ctrl_c().await;
        wait_or_park(StopSignal::Interrupt, installed).await
    };

    #[cfg(unix)]
    let terminate = async {
        let installed = signal(SignalKind::terminate()).map(|mut stream| async move {
            stream.recv().await;
        });
        match installed {
            Ok(recv) => {
                recv.await;
                StopSignal::Terminate
            }
            Err(err) => wait_or_park(StopSignal::Terminate, Err(err)).await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<StopSignal>();

    let received = tokio::select! {
        s = interrupt => s,
        s = terminate => s,
    };

    tracing::info!(
        target: TRACING_TARGET_SHUTDOWN,
        signal = %received,
        "Stop signal received"
    );
    received
}

async fn wait_or_park(kind: StopSignal, installed: io::Result<()>) -> StopSignal {
    if let Err(err) = installed {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            signal = %kind,
            error = %err,
            "Failed to install signal listener"
        );
        std::future::pending::<()>().await;
    }
    kind
}
