use crate::base::kind::TransportKind;
use crate::base::neterror::TransportError;
use crate::channel::BoxedSocket;
use crate::establish::target_label;
use crate::socket::slot::SlotTarget;
use url::Url;

/// One request to the factory: a transport kind plus its arguments.
#[derive(Debug)]
pub enum TransportRequest {
    InProc { channel_id: String },
    /// Wrap an already-open socket.
    Socket { socket: BoxedSocket, address: Option<String>, port: Option<u16> },
    /// Connect to `address:port`, or to the IPC path `address` without a port.
    InitiatingSocket { address: String, port: Option<u16> },
    Http { connection_string: String, address: String, port: Option<u16> },
    WebSocket { connection_string: String, address: String, port: Option<u16> },
    Process { command: String, args: Vec<String> },
    ExternalProcess { command: String, args: Vec<String> },
}

impl TransportRequest {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportRequest::InProc { .. } => TransportKind::InProc,
            TransportRequest::Socket { .. } => TransportKind::Socket,
            TransportRequest::InitiatingSocket { .. } => TransportKind::InitiatingSocket,
            TransportRequest::Http { .. } => TransportKind::Http,
            TransportRequest::WebSocket { .. } => TransportKind::WebSocket,
            TransportRequest::Process { .. } => TransportKind::Process,
            TransportRequest::ExternalProcess { .. } => TransportKind::ExternalProcess,
        }
    }

    pub fn inproc(channel_id: impl Into<String>) -> Self {
        TransportRequest::InProc { channel_id: channel_id.into() }
    }

    pub fn socket(socket: BoxedSocket) -> Self {
        TransportRequest::Socket { socket, address: None, port: None }
    }

    pub fn initiating_socket(address: impl Into<String>, port: u16) -> Self {
        TransportRequest::InitiatingSocket { address: address.into(), port: Some(port) }
    }

    /// Initiating socket to a local IPC path.
    pub fn ipc(path: impl Into<String>) -> Self {
        TransportRequest::InitiatingSocket { address: path.into(), port: None }
    }

    pub fn http(connection_string: impl Into<String>) -> Self {
        TransportRequest::Http {
            connection_string: connection_string.into(),
            address: String::new(),
            port: None,
        }
    }

    pub fn websocket(connection_string: impl Into<String>) -> Self {
        TransportRequest::WebSocket {
            connection_string: connection_string.into(),
            address: String::new(),
            port: None,
        }
    }

    pub fn process<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TransportRequest::Process {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a request from a kind tag and positional string arguments:
    ///
    /// | tag | arguments |
    /// |---|---|
    /// | `inproc` | channel id |
    /// | `initiatingsocket` | address, port? |
    /// | `http`, `ws` | connection string, address?, port? |
    /// | `proc`, `externalproc` | command, args... |
    ///
    /// `socket` needs a live handle and cannot be built from strings.
    pub fn from_tag(tag: &str, args: &[&str]) -> Result<Self, TransportError> {
        let kind: TransportKind = tag.parse()?;
        let arg = |i: usize| args.get(i).copied();
        let required = |i: usize, what: &str| {
            arg(i).ok_or_else(|| TransportError::InvalidArguments {
                protocol: tag.to_string(),
                reason: format!("missing {}", what),
            })
        };

        let request = match kind {
            TransportKind::InProc => {
                TransportRequest::inproc(required(0, "channel id")?)
            }
            TransportKind::Socket => {
                return Err(TransportError::InvalidArguments {
                    protocol: tag.to_string(),
                    reason: "an open socket handle is required".to_string(),
                })
            }
            TransportKind::InitiatingSocket => {
                let address = required(0, "address")?;
                TransportRequest::InitiatingSocket {
                    address: address.to_string(),
                    port: parse_port(address, arg(1))?,
                }
            }
            TransportKind::Http | TransportKind::WebSocket => {
                let connection_string = required(0, "connection string")?.to_string();
                let address = arg(1).unwrap_or_default().to_string();
                let port = parse_port(&connection_string, arg(2))?;
                if kind == TransportKind::Http {
                    TransportRequest::Http { connection_string, address, port }
                } else {
                    TransportRequest::WebSocket { connection_string, address, port }
                }
            }
            TransportKind::Process | TransportKind::ExternalProcess => {
                let command = required(0, "command")?.to_string();
                let args = args[1..].iter().map(|a| a.to_string()).collect();
                if kind == TransportKind::Process {
                    TransportRequest::Process { command, args }
                } else {
                    TransportRequest::ExternalProcess { command, args }
                }
            }
        };
        Ok(request)
    }
}

fn parse_port(target: &str, port: Option<&str>) -> Result<Option<u16>, TransportError> {
    match port {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u16>()
            .map(Some)
            .map_err(|_| TransportError::unconnectable(format!("{}:{}", target, raw))),
    }
}

fn check_connection_string(
    connection_string: &str,
    schemes: &[&str],
) -> Result<(), TransportError> {
    let url = Url::parse(connection_string)
        .map_err(|_| TransportError::unconnectable(connection_string))?;
    if !schemes.contains(&url.scheme()) || url.host_str().is_none() {
        return Err(TransportError::unconnectable(connection_string));
    }
    Ok(())
}

/// Validate a deduplicating request and turn it into a slot target.
pub(crate) fn slot_target(
    kind: TransportKind,
    address: String,
    port: Option<u16>,
    connection_string: Option<String>,
) -> Result<SlotTarget, TransportError> {
    match kind {
        TransportKind::InitiatingSocket => {
            if address.trim().is_empty() {
                return Err(TransportError::unconnectable(target_label(&address, port)));
            }
            Ok(SlotTarget::Socket { address, port })
        }
        TransportKind::Http => {
            let connection_string = connection_string.unwrap_or_default();
            check_connection_string(&connection_string, &["http", "https"])?;
            Ok(SlotTarget::Http { connection_string, address, port })
        }
        TransportKind::WebSocket => {
            let connection_string = connection_string.unwrap_or_default();
            check_connection_string(&connection_string, &["ws", "wss"])?;
            Ok(SlotTarget::WebSocket { connection_string, address, port })
        }
        other => Err(TransportError::InvalidArguments {
            protocol: other.tag().to_string(),
            reason: "kind does not deduplicate".to_string(),
        }),
    }
}
