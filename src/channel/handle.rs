use crate::base::kind::TransportKind;
use crate::channel::stream::BoxedSocket;
use bytes::Bytes;
use http_body_util::Full;
use hyper::client::conn::http1;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Request sender of an established HTTP/1.1 connection.
pub type HttpSender = http1::SendRequest<Full<Bytes>>;

/// Type alias for the WebSocket stream.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// The live transport carried by a [`Channel`].
pub enum ChannelTransport {
    /// TCP, IPC or in-process byte stream.
    Stream(BoxedSocket),
    /// HTTP/1.1 connection; its driver runs on a background task.
    Http(HttpSender),
    WebSocket(WsStream),
    Process(tokio::process::Child),
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelTransport::Stream(s) => f.debug_tuple("Stream").field(s).finish(),
            ChannelTransport::Http(_) => f.write_str("Http"),
            ChannelTransport::WebSocket(_) => f.write_str("WebSocket"),
            ChannelTransport::Process(child) => {
                f.debug_tuple("Process").field(&child.id()).finish()
            }
        }
    }
}

struct ChannelInner {
    id: u64,
    kind: TransportKind,
    peer: String,
    transport: Mutex<Option<ChannelTransport>>,
    closing: watch::Sender<bool>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.closing.send_if_modified(|closed| !std::mem::replace(closed, true));
    }
}

/// A live transport handle produced by an establisher.
///
/// Clones share the same underlying transport; every observer of a
/// [`PendingResult`](crate::socket::pending::PendingResult) receives a clone.
/// The transport itself can be taken exactly once.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    pub fn new(kind: TransportKind, peer: impl Into<String>, transport: ChannelTransport) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            inner: Arc::new(ChannelInner {
                id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                peer: peer.into(),
                transport: Mutex::new(Some(transport)),
                closing,
            }),
        }
    }

    /// Process-unique channel id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> TransportKind {
        self.inner.kind
    }

    /// Where this channel leads (address, connection string, command...).
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    /// Take ownership of the transport. Returns `None` once taken or closed.
    pub fn take_transport(&self) -> Option<ChannelTransport> {
        self.inner.transport.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Whether the transport has not been taken yet.
    pub fn has_transport(&self) -> bool {
        self.inner.transport.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closing.borrow()
    }

    /// A channel is usable until it is closed.
    pub fn is_usable(&self) -> bool {
        !self.is_closed()
    }

    /// Fire the about-to-close notification and drop the transport if it was
    /// never taken. Returns `false` if the channel was already closed.
    pub fn close(&self) -> bool {
        let fired = self.inner.closing.send_if_modified(|closed| !std::mem::replace(closed, true));
        if fired {
            tracing::debug!(channel = self.inner.id, kind = %self.inner.kind, "closing channel");
            drop(self.take_transport());
        }
        fired
    }

    /// Subscribe to the about-to-close notification.
    pub fn about_to_close(&self) -> watch::Receiver<bool> {
        self.inner.closing.subscribe()
    }

    /// Wait until the channel is about to close.
    pub async fn closing(&self) {
        let mut rx = self.about_to_close();
        // Err only if the sender is gone, which also means closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn ptr_eq(a: &Channel, b: &Channel) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakChannel {
        WeakChannel { inner: Arc::downgrade(&self.inner) }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Non-owning reference to a channel.
#[derive(Clone)]
pub(crate) struct WeakChannel {
    inner: Weak<ChannelInner>,
}

impl WeakChannel {
    pub(crate) fn upgrade(&self) -> Option<Channel> {
        self.inner.upgrade().map(|inner| Channel { inner })
    }
}
