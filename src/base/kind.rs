use crate::base::neterror::TransportError;
use std::fmt;
use std::str::FromStr;

/// Transport kinds understood by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    InProc,
    Socket,
    InitiatingSocket,
    Http,
    WebSocket,
    Process,
    ExternalProcess,
}

impl TransportKind {
    pub const ALL: [TransportKind; 7] = [
        TransportKind::InProc,
        TransportKind::Socket,
        TransportKind::InitiatingSocket,
        TransportKind::Http,
        TransportKind::WebSocket,
        TransportKind::Process,
        TransportKind::ExternalProcess,
    ];

    /// The dispatch tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            TransportKind::InProc => "inproc",
            TransportKind::Socket => "socket",
            TransportKind::InitiatingSocket => "initiatingsocket",
            TransportKind::Http => "http",
            TransportKind::WebSocket => "ws",
            TransportKind::Process => "proc",
            TransportKind::ExternalProcess => "externalproc",
        }
    }

    /// Whether concurrent requests for the same key share one attempt.
    pub fn dedups(self) -> bool {
        matches!(
            self,
            TransportKind::InitiatingSocket | TransportKind::Http | TransportKind::WebSocket
        )
    }

    /// Whether transient failures are retried.
    pub fn retries(self) -> bool {
        matches!(self, TransportKind::InitiatingSocket)
    }

    /// Protocol label used in error messages.
    pub fn protocol(self) -> &'static str {
        match self {
            TransportKind::Socket | TransportKind::InitiatingSocket => "socket",
            other => other.tag(),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        TransportKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| TransportError::UnsupportedProtocol { protocol: tag.to_string() })
    }
}
