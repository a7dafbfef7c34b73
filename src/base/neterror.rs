use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Renders an optional port as `:port`, or nothing.
struct PortSuffix<'a>(&'a Option<u16>);

impl fmt::Display for PortSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(port) => write!(f, ":{}", port),
            None => Ok(()),
        }
    }
}

/// Errors surfaced through a [`PendingResult`](crate::socket::pending::PendingResult).
///
/// Every variant is cloneable so that a single rejection can fan out to every
/// observer attached to the same slot.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Could not connect to {protocol}://{address}{}", PortSuffix(.port))]
    DestinationNotFound { protocol: &'static str, address: String, port: Option<u16> },

    #[error("No server at {protocol}://{address}{}", PortSuffix(.port))]
    NoServerListening { protocol: &'static str, address: String, port: Option<u16> },

    #[error("Already connected to {address}{}", PortSuffix(.port))]
    AlreadyConnected { address: String, port: Option<u16> },

    #[error("Protocol {protocol} is not supported")]
    UnsupportedProtocol { protocol: String },

    #[error("Connection string {connection_string} is not connectable")]
    UnconnectableAddress { connection_string: String },

    #[error("{reason}")]
    ShutdownInProgress { reason: String },

    #[error("{protocol} handshake with {connection_string} failed: {reason}")]
    HandshakeFailed { protocol: &'static str, connection_string: String, reason: String },

    #[error("Failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Invalid arguments for {protocol}: {reason}")]
    InvalidArguments { protocol: String, reason: String },

    #[error("Gave up on {address}{} after {attempts} attempts", PortSuffix(.port))]
    TooManyRetries { address: String, port: Option<u16>, attempts: usize },

    #[error("Connection attempt abandoned before settling")]
    Abandoned,
}

impl TransportError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::DestinationNotFound { .. } => "ADDRESS_NOT_FOUND",
            TransportError::NoServerListening { .. } => "NO_SERVER",
            TransportError::AlreadyConnected { .. } => "ALREADY_CONNECTED",
            TransportError::UnsupportedProtocol { .. } => "UNSUPPORTED_PROTOCOL",
            TransportError::UnconnectableAddress { .. } => "BAD_ADDRESS",
            TransportError::ShutdownInProgress { .. } => "SHUTDOWN",
            TransportError::HandshakeFailed { .. } => "HANDSHAKE_FAILED",
            TransportError::SpawnFailed { .. } => "SPAWN_FAILED",
            TransportError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            TransportError::TooManyRetries { .. } => "TOO_MANY_RETRIES",
            TransportError::Abandoned => "ABANDONED",
        }
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        TransportError::ShutdownInProgress { reason: reason.into() }
    }

    pub fn unconnectable(connection_string: impl Into<String>) -> Self {
        TransportError::UnconnectableAddress { connection_string: connection_string.into() }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, TransportError::ShutdownInProgress { .. })
    }

    /// Destination of the failed attempt, for the variants that carry one.
    pub fn destination(&self) -> Option<(&str, Option<u16>)> {
        match self {
            TransportError::DestinationNotFound { address, port, .. }
            | TransportError::NoServerListening { address, port, .. }
            | TransportError::AlreadyConnected { address, port }
            | TransportError::TooManyRetries { address, port, .. } => {
                Some((address.as_str(), *port))
            }
            _ => None,
        }
    }
}

/// Low-level error signal emitted by a socket attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketErrorCode {
    /// The local endpoint does not exist (missing IPC path).
    NoEntry,
    /// The address could not be resolved.
    NotFound,
    /// Nothing is accepting connections at the destination.
    ConnectionRefused,
    /// Anything else; treated as transient.
    Other(io::ErrorKind),
}

impl From<&io::Error> for SocketErrorCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SocketErrorCode::NoEntry,
            io::ErrorKind::ConnectionRefused => SocketErrorCode::ConnectionRefused,
            kind => SocketErrorCode::Other(kind),
        }
    }
}

impl From<io::Error> for SocketErrorCode {
    fn from(err: io::Error) -> Self {
        SocketErrorCode::from(&err)
    }
}

/// Outcome of classifying a low-level socket error.
#[derive(Debug, Clone)]
pub enum Classification {
    /// Stop retrying and reject every observer with this error.
    Fatal(TransportError),
    /// Absorb the error and try again after the retry delay.
    Transient,
}

impl Classification {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Classification::Fatal(_))
    }
}

/// Classify a socket error signal for the attempt against `address:port`.
pub fn classify(
    code: SocketErrorCode,
    protocol: &'static str,
    address: &str,
    port: Option<u16>,
) -> Classification {
    match code {
        SocketErrorCode::NoEntry | SocketErrorCode::NotFound => {
            Classification::Fatal(TransportError::DestinationNotFound {
                protocol,
                address: address.to_string(),
                port,
            })
        }
        SocketErrorCode::ConnectionRefused => {
            Classification::Fatal(TransportError::NoServerListening {
                protocol,
                address: address.to_string(),
                port,
            })
        }
        SocketErrorCode::Other(_) => Classification::Transient,
    }
}
