//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into `TransportError` variants or signal codes.

use crate::base::neterror::{SocketErrorCode, TransportError};
use std::io;
use std::sync::Arc;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Attach the command that failed to spawn.
    ///
    /// # Example
    /// ```ignore
    /// use transportnet::base::context::IoResultExt;
    ///
    /// let child = Command::new("cat").spawn().spawn_context("cat")?;
    /// // Error: "Failed to spawn cat: No such file or directory"
    /// ```
    fn spawn_context(self, command: &str) -> Result<T, TransportError>;

    /// Reduce an IO error to the low-level signal code used for classification.
    fn signal_code(self) -> Result<T, SocketErrorCode>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn spawn_context(self, command: &str) -> Result<T, TransportError> {
        self.map_err(|e| TransportError::SpawnFailed {
            command: command.to_string(),
            source: Arc::new(e),
        })
    }

    fn signal_code(self) -> Result<T, SocketErrorCode> {
        self.map_err(SocketErrorCode::from)
    }
}
