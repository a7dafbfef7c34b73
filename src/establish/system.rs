//! Tokio-backed establisher.
//!
//! - sockets: resolve through [`Resolve`], then try each address in order
//! - IPC: unix stream sockets when no port is given
//! - HTTP: TCP connect + hyper HTTP/1.1 handshake, connection driver spawned
//! - WebSocket: TCP connect + tokio-tungstenite client handshake
//! - processes: `tokio::process`

use super::{target_label, Establish, Handshaking, InProcHub, Opening, SocketSignal};
use crate::base::context::IoResultExt;
use crate::base::kind::TransportKind;
use crate::base::neterror::{classify, Classification, SocketErrorCode, TransportError};
use crate::channel::{BoxedSocket, Channel, ChannelTransport};
use crate::dns::{GaiResolver, Name, Resolve};
use bytes::Bytes;
use http_body_util::Full;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::process::Command;
use url::Url;

/// Default [`Establish`] implementation.
#[derive(Clone)]
pub struct SystemEstablisher {
    resolver: Arc<dyn Resolve>,
    hub: InProcHub,
}

impl Default for SystemEstablisher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemEstablisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEstablisher")
            .field("inproc_pending", &self.hub.pending_count())
            .finish_non_exhaustive()
    }
}

impl SystemEstablisher {
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(GaiResolver::new()))
    }

    pub fn with_resolver(resolver: Arc<dyn Resolve>) -> Self {
        Self { resolver, hub: InProcHub::new() }
    }

    /// The hub backing `inproc` channels; the accepting side uses it.
    pub fn hub(&self) -> &InProcHub {
        &self.hub
    }

    /// Accept the far end of an in-process channel opened through this establisher.
    pub fn accept_inproc(&self, channel_id: &str) -> Option<BoxedSocket> {
        self.hub.accept(channel_id)
    }

    fn spawn(
        &self,
        kind: TransportKind,
        command: &str,
        args: &[String],
        kill_on_drop: bool,
    ) -> Result<Channel, TransportError> {
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(kill_on_drop)
            .spawn()
            .spawn_context(command)?;
        tracing::debug!(command, pid = ?child.id(), kind = %kind, "spawned process");
        Ok(Channel::new(kind, command, ChannelTransport::Process(child)))
    }
}

async fn connect_tcp_stream(
    resolver: Arc<dyn Resolve>,
    address: &str,
    port: u16,
) -> Result<TcpStream, SocketErrorCode> {
    let addrs = match resolver.resolve(Name::new(address), port).await {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::debug!(address, port, error = %e, "resolution failed");
            return Err(SocketErrorCode::NotFound);
        }
    };

    let mut last = SocketErrorCode::Other(io::ErrorKind::AddrNotAvailable);
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "TCP connect failed");
                last = SocketErrorCode::from(&e);
            }
        }
    }
    Err(last)
}

async fn connect_tcp(resolver: Arc<dyn Resolve>, address: &str, port: u16) -> SocketSignal {
    match connect_tcp_stream(resolver, address, port).await {
        Ok(stream) => SocketSignal::Connected(BoxedSocket::new(stream)),
        Err(code) => SocketSignal::Error(code),
    }
}

#[cfg(unix)]
async fn connect_ipc(path: &str) -> SocketSignal {
    match tokio::net::UnixStream::connect(path).await.signal_code() {
        Ok(stream) => SocketSignal::Connected(BoxedSocket::new(stream)),
        Err(code) => {
            tracing::debug!(path, code = ?code, "IPC connect failed");
            SocketSignal::Error(code)
        }
    }
}

#[cfg(not(unix))]
async fn connect_ipc(path: &str) -> SocketSignal {
    tracing::debug!(path, "IPC sockets are not available on this platform");
    SocketSignal::Error(SocketErrorCode::NoEntry)
}

/// Map a failed pre-handshake connect to the error surfaced for HTTP/WS.
fn connect_failure(
    code: SocketErrorCode,
    protocol: &'static str,
    connection_string: &str,
    address: &str,
    port: Option<u16>,
) -> TransportError {
    match classify(code, protocol, address, port) {
        Classification::Fatal(err) => err,
        Classification::Transient => TransportError::HandshakeFailed {
            protocol,
            connection_string: connection_string.to_string(),
            reason: format!("{:?}", code),
        },
    }
}

fn parse_connection_string(connection_string: &str) -> Result<Url, TransportError> {
    Url::parse(connection_string).map_err(|_| TransportError::unconnectable(connection_string))
}

/// Host to dial: the explicit address when given, else the URL host.
fn dial_host(url: &Url, address: String) -> String {
    if address.is_empty() {
        url.host_str().unwrap_or_default().to_string()
    } else {
        address
    }
}

impl Establish for SystemEstablisher {
    fn open_socket(&self, address: &str, port: Option<u16>) -> Opening {
        let address = address.to_string();
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            match port {
                Some(port) => connect_tcp(resolver, &address, port).await,
                None => connect_ipc(&address).await,
            }
        })
    }

    fn wrap_socket(
        &self,
        socket: BoxedSocket,
        address: Option<&str>,
        port: Option<u16>,
    ) -> Result<Channel, TransportError> {
        let peer = match (address, socket.peer()) {
            (Some(address), _) => target_label(address, port),
            (None, Some(peer)) => peer.to_string(),
            (None, None) => "socket".to_string(),
        };
        Ok(Channel::new(TransportKind::Socket, peer, ChannelTransport::Stream(socket)))
    }

    fn open_http(
        &self,
        connection_string: &str,
        address: &str,
        port: Option<u16>,
    ) -> Handshaking {
        let connection_string = connection_string.to_string();
        let address = address.to_string();
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let url = parse_connection_string(&connection_string)?;
            let host = dial_host(&url, address);
            let port = port.or_else(|| url.port_or_known_default());

            let signal = match port {
                Some(port) => connect_tcp(resolver, &host, port).await,
                None => connect_ipc(&host).await,
            };
            let socket = match signal {
                SocketSignal::Connected(socket) => socket,
                SocketSignal::Error(code) => {
                    return Err(connect_failure(code, "http", &connection_string, &host, port))
                }
            };

            let (sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(socket))
                .await
                .map_err(|e| TransportError::HandshakeFailed {
                    protocol: "http",
                    connection_string: connection_string.clone(),
                    reason: e.to_string(),
                })?;

            let transport = ChannelTransport::Http(sender);
            let channel = Channel::new(TransportKind::Http, connection_string, transport);
            let weak = channel.downgrade();
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(error = %e, "HTTP connection driver failed");
                }
                if let Some(channel) = weak.upgrade() {
                    channel.close();
                }
            });
            Ok(channel)
        })
    }

    fn open_websocket(
        &self,
        connection_string: &str,
        address: &str,
        port: Option<u16>,
    ) -> Handshaking {
        let connection_string = connection_string.to_string();
        let address = address.to_string();
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let url = parse_connection_string(&connection_string)?;
            let host = dial_host(&url, address);
            let Some(port) = port.or_else(|| url.port_or_known_default()) else {
                return Err(TransportError::unconnectable(connection_string));
            };

            // The handshake itself still carries the URL's host and path.
            let stream = match connect_tcp_stream(resolver, &host, port).await {
                Ok(stream) => stream,
                Err(code) => {
                    tracing::debug!(host, port, code = ?code, "WebSocket connect failed");
                    let port = Some(port);
                    return Err(connect_failure(code, "ws", &connection_string, &host, port));
                }
            };

            match tokio_tungstenite::client_async_tls(connection_string.as_str(), stream).await {
                Ok((stream, _response)) => Ok(Channel::new(
                    TransportKind::WebSocket,
                    connection_string,
                    ChannelTransport::WebSocket(stream),
                )),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "WebSocket handshake error");
                    Err(TransportError::HandshakeFailed {
                        protocol: "ws",
                        connection_string,
                        reason: e.to_string(),
                    })
                }
            }
        })
    }

    fn open_inproc(&self, channel_id: &str) -> Result<Channel, TransportError> {
        Ok(self.hub.open(channel_id))
    }

    fn spawn_process(&self, command: &str, args: &[String]) -> Result<Channel, TransportError> {
        self.spawn(TransportKind::Process, command, args, true)
    }

    fn attach_external_process(
        &self,
        command: &str,
        args: &[String],
    ) -> Result<Channel, TransportError> {
        self.spawn(TransportKind::ExternalProcess, command, args, false)
    }
}
