//! Channel establishment.
//!
//! The [`Establish`] trait is the seam between the slot engine and the code
//! that actually opens sockets, performs HTTP/WebSocket handshakes or spawns
//! processes. [`SystemEstablisher`] is the tokio-backed implementation; tests
//! substitute scripted ones.
//!
//! # Example
//!
//! ```rust,ignore
//! use transportnet::establish::{Establish, SocketSignal, SystemEstablisher};
//!
//! let establisher = SystemEstablisher::new();
//! match establisher.open_socket("127.0.0.1", Some(8080)).await {
//!     SocketSignal::Connected(socket) => println!("connected to {:?}", socket.peer()),
//!     SocketSignal::Error(code) => println!("failed: {:?}", code),
//! }
//! ```

mod inproc;
mod system;

pub use inproc::InProcHub;
pub use system::SystemEstablisher;

use crate::base::neterror::{SocketErrorCode, TransportError};
use crate::channel::{BoxedSocket, Channel};
use futures::future::BoxFuture;
use std::sync::Arc;

/// The single signal produced by one socket attempt.
#[derive(Debug)]
pub enum SocketSignal {
    Connected(BoxedSocket),
    Error(SocketErrorCode),
}

/// Future returned by [`Establish::open_socket`].
pub type Opening = BoxFuture<'static, SocketSignal>;

/// Future returned by the HTTP and WebSocket handshakes.
pub type Handshaking = BoxFuture<'static, Result<Channel, TransportError>>;

/// Performs the transport-specific work of opening a channel.
///
/// Implementations must be thread-safe; the factory shares one instance across
/// every slot.
pub trait Establish: Send + Sync {
    /// Start a socket attempt. With `port == None`, `address` is an IPC path.
    ///
    /// The returned future resolves to exactly one signal.
    fn open_socket(&self, address: &str, port: Option<u16>) -> Opening;

    /// Wrap a connected socket into a channel.
    fn wrap_socket(
        &self,
        socket: BoxedSocket,
        address: Option<&str>,
        port: Option<u16>,
    ) -> Result<Channel, TransportError>;

    /// HTTP/WS handshakes dial `address` and `port` when given, falling back
    /// to the connection string's host and port; the handshake itself always
    /// uses the connection string.
    fn open_http(&self, connection_string: &str, address: &str, port: Option<u16>)
        -> Handshaking;

    fn open_websocket(
        &self,
        connection_string: &str,
        address: &str,
        port: Option<u16>,
    ) -> Handshaking;

    fn open_inproc(&self, channel_id: &str) -> Result<Channel, TransportError>;

    /// Spawn a child process owned by the channel (killed when it closes).
    fn spawn_process(&self, command: &str, args: &[String]) -> Result<Channel, TransportError>;

    /// Spawn a process that outlives the channel.
    fn attach_external_process(
        &self,
        command: &str,
        args: &[String],
    ) -> Result<Channel, TransportError>;
}

impl<E: Establish + ?Sized> Establish for Arc<E> {
    fn open_socket(&self, address: &str, port: Option<u16>) -> Opening {
        (**self).open_socket(address, port)
    }

    fn wrap_socket(
        &self,
        socket: BoxedSocket,
        address: Option<&str>,
        port: Option<u16>,
    ) -> Result<Channel, TransportError> {
        (**self).wrap_socket(socket, address, port)
    }

    fn open_http(
        &self,
        connection_string: &str,
        address: &str,
        port: Option<u16>,
    ) -> Handshaking {
        (**self).open_http(connection_string, address, port)
    }

    fn open_websocket(
        &self,
        connection_string: &str,
        address: &str,
        port: Option<u16>,
    ) -> Handshaking {
        (**self).open_websocket(connection_string, address, port)
    }

    fn open_inproc(&self, channel_id: &str) -> Result<Channel, TransportError> {
        (**self).open_inproc(channel_id)
    }

    fn spawn_process(&self, command: &str, args: &[String]) -> Result<Channel, TransportError> {
        (**self).spawn_process(command, args)
    }

    fn attach_external_process(
        &self,
        command: &str,
        args: &[String],
    ) -> Result<Channel, TransportError> {
        (**self).attach_external_process(command, args)
    }
}

/// Label for a destination: `address:port`, or the bare address without a port.
pub fn target_label(address: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}:{}", address, port),
        None => address.to_string(),
    }
}
