//! Byte-stream abstraction for socket-like channels.
//!
//! TCP connections, IPC (unix) sockets and in-process duplex pipes all end up
//! behind [`BoxedSocket`], so the slot and channel layers never care which one
//! the establisher produced.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;

/// A trait for any socket that supports async read/write operations.
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {
    /// Human-readable peer, when known.
    fn peer_label(&self) -> Option<String> {
        None
    }
}

impl StreamSocket for TcpStream {
    fn peer_label(&self) -> Option<String> {
        self.peer_addr().ok().map(|addr| addr.to_string())
    }
}

#[cfg(unix)]
impl StreamSocket for tokio::net::UnixStream {
    fn peer_label(&self) -> Option<String> {
        self.peer_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(|p| p.display().to_string()))
    }
}

impl StreamSocket for DuplexStream {}

/// A wrapper type for a boxed dynamic StreamSocket.
pub struct BoxedSocket {
    inner: Pin<Box<dyn StreamSocket>>,
    peer: Option<String>,
}

impl BoxedSocket {
    /// Create a new BoxedSocket from any StreamSocket.
    pub fn new<S: StreamSocket>(socket: S) -> Self {
        let peer = socket.peer_label();
        Self { inner: Box::pin(socket), peer }
    }

    /// Get a pinned mutable reference to the inner socket.
    pub fn as_mut(&mut self) -> Pin<&mut dyn StreamSocket> {
        self.inner.as_mut()
    }

    /// Peer captured when the socket was boxed.
    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }
}

impl fmt::Debug for BoxedSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedSocket").field("peer", &self.peer).finish_non_exhaustive()
    }
}

impl AsyncRead for BoxedSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}
