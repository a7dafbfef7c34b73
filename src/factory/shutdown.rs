//! Factory-wide shutdown.

use crate::base::neterror::TransportError;
use crate::factory::Factory;
use crate::socket::registry::Registry;
use std::io;
use std::sync::{Arc, OnceLock};

/// One-shot shutdown flag plus the reason it fired with.
///
/// The reason doubles as the closed flag: it is written exactly once, before
/// any slot is destroyed.
#[derive(Debug, Default)]
pub struct ShutdownBroadcaster {
    reason: OnceLock<String>,
}

impl ShutdownBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// The error handed to callers once closed.
    pub fn error(&self) -> Option<TransportError> {
        self.reason().map(TransportError::shutdown)
    }

    /// Close and reject every slot currently registered in `registries`.
    ///
    /// Returns the number of slots destroyed, or `None` if already closed.
    pub fn fire(&self, reason: String, registries: &[&Arc<Registry>]) -> Option<usize> {
        if self.reason.set(reason).is_err() {
            return None;
        }
        let error = self.error()?;
        let mut destroyed = 0;
        for registry in registries {
            // Each destroy removes its own entry.
            for slot in registry.snapshot() {
                if slot.destroy(error.clone()) {
                    destroyed += 1;
                }
            }
        }
        Some(destroyed)
    }
}

/// Wait for Ctrl-C (or SIGTERM on unix) and shut `factory` down with the
/// signal name as reason.
///
/// Only a weak reference is held while waiting, so dropping every other
/// handle still shuts the factory down normally. Returns `false` if the
/// factory was already gone or closed when the signal arrived.
pub async fn shutdown_on_signal(factory: Factory) -> io::Result<bool> {
    let weak = Arc::downgrade(&factory.inner);
    drop(factory);

    let signal = wait_for_signal().await?;
    tracing::info!(signal, "shutdown signal received");
    match weak.upgrade() {
        Some(inner) => Ok(Factory { inner }.shutdown(signal)),
        None => Ok(false),
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "SIGINT")
}
