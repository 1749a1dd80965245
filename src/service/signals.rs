// src/service/signals.rs

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::info;

use crate::errors::Result;
use crate::service::ServiceHandle;

/// Translate process signals into service events.
///
/// `SIGINT`/`SIGTERM` request a graceful shutdown, `SIGUSR1` a status dump.
/// The listener ends after the first shutdown request.
pub fn spawn_signal_listener(handle: ServiceHandle) -> Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut status = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = interrupt.recv() => {
                    info!("SIGINT received; shutting down");
                    handle.shutdown();
                    break;
                }
                _ = terminate.recv() => {
                    info!("SIGTERM received; shutting down");
                    handle.shutdown();
                    break;
                }
                _ = status.recv() => handle.dump_status(),
            }
        }
    }))
}
