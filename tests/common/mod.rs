//! Scripted establisher shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use transportnet::base::kind::TransportKind;
use transportnet::base::neterror::{SocketErrorCode, TransportError};
use transportnet::channel::{BoxedSocket, Channel, ChannelTransport};
use transportnet::establish::{target_label, Establish, Handshaking, Opening, SocketSignal};

/// What the next socket attempt does.
pub enum SocketStep {
    Connect,
    Fail(SocketErrorCode),
    Wait(oneshot::Receiver<SocketSignal>),
}

/// What the next HTTP/WebSocket handshake does.
pub enum HandshakeStep {
    Accept,
    Fail(TransportError),
    Wait(oneshot::Receiver<Result<Channel, TransportError>>),
}

/// Establisher whose socket attempts and handshakes follow a script.
///
/// Once the script runs out, attempts never resolve unless a repeating
/// failure was set with [`MockEstablisher::fail_sockets_forever`].
pub struct MockEstablisher {
    sockets: Mutex<VecDeque<SocketStep>>,
    handshakes: Mutex<VecDeque<HandshakeStep>>,
    socket_fallback: Mutex<Option<SocketErrorCode>>,
    opens: mpsc::UnboundedSender<String>,
    open_times: Mutex<Vec<Instant>>,
    pub socket_calls: AtomicUsize,
    pub handshake_calls: AtomicUsize,
    pub immediate_calls: AtomicUsize,
}

/// Receives the key of every socket attempt and handshake, in order.
pub struct OpenLog {
    rx: mpsc::UnboundedReceiver<String>,
}

impl OpenLog {
    pub async fn next(&mut self) -> String {
        self.rx.recv().await.expect("establisher dropped")
    }

    pub fn try_next(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl MockEstablisher {
    pub fn new() -> (Arc<Self>, OpenLog) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mock = Arc::new(Self {
            sockets: Mutex::new(VecDeque::new()),
            handshakes: Mutex::new(VecDeque::new()),
            socket_fallback: Mutex::new(None),
            opens: tx,
            open_times: Mutex::new(Vec::new()),
            socket_calls: AtomicUsize::new(0),
            handshake_calls: AtomicUsize::new(0),
            immediate_calls: AtomicUsize::new(0),
        });
        (mock, OpenLog { rx })
    }

    pub fn push_socket(&self, step: SocketStep) {
        self.sockets.lock().unwrap().push_back(step);
    }

    /// Queue a socket attempt that resolves when the returned sender fires.
    pub fn hold_socket(&self) -> oneshot::Sender<SocketSignal> {
        let (tx, rx) = oneshot::channel();
        self.push_socket(SocketStep::Wait(rx));
        tx
    }

    pub fn push_handshake(&self, step: HandshakeStep) {
        self.handshakes.lock().unwrap().push_back(step);
    }

    pub fn fail_sockets_forever(&self, code: SocketErrorCode) {
        *self.socket_fallback.lock().unwrap() = Some(code);
    }

    pub fn socket_calls(&self) -> usize {
        self.socket_calls.load(Ordering::SeqCst)
    }

    pub fn handshake_calls(&self) -> usize {
        self.handshake_calls.load(Ordering::SeqCst)
    }

    pub fn immediate_calls(&self) -> usize {
        self.immediate_calls.load(Ordering::SeqCst)
    }

    /// Instants at which socket attempts started.
    pub fn open_times(&self) -> Vec<Instant> {
        self.open_times.lock().unwrap().clone()
    }

    fn handshake(&self, kind: TransportKind, connection_string: &str) -> Handshaking {
        self.handshake_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.opens.send(connection_string.to_string());
        let step = self.handshakes.lock().unwrap().pop_front();
        let peer = connection_string.to_string();
        Box::pin(async move {
            match step {
                Some(HandshakeStep::Accept) => Ok(stream_channel(kind, &peer)),
                Some(HandshakeStep::Fail(err)) => Err(err),
                Some(HandshakeStep::Wait(rx)) => rx.await.unwrap_or(Err(TransportError::Abandoned)),
                None => std::future::pending().await,
            }
        })
    }

    fn immediate(&self, kind: TransportKind, peer: &str) -> Result<Channel, TransportError> {
        self.immediate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(stream_channel(kind, peer))
    }
}

/// A channel over one end of an in-memory pipe.
pub fn stream_channel(kind: TransportKind, peer: &str) -> Channel {
    Channel::new(kind, peer, ChannelTransport::Stream(socket_pair().0))
}

pub fn socket_pair() -> (BoxedSocket, BoxedSocket) {
    let (a, b) = tokio::io::duplex(1024);
    (BoxedSocket::new(a), BoxedSocket::new(b))
}

pub fn connected() -> SocketSignal {
    SocketSignal::Connected(socket_pair().0)
}

impl Establish for MockEstablisher {
    fn open_socket(&self, address: &str, port: Option<u16>) -> Opening {
        self.socket_calls.fetch_add(1, Ordering::SeqCst);
        self.open_times.lock().unwrap().push(Instant::now());
        let _ = self.opens.send(target_label(address, port));

        let step = self.sockets.lock().unwrap().pop_front();
        let fallback = *self.socket_fallback.lock().unwrap();
        Box::pin(async move {
            match step {
                Some(SocketStep::Connect) => connected(),
                Some(SocketStep::Fail(code)) => SocketSignal::Error(code),
                Some(SocketStep::Wait(rx)) => rx.await.unwrap_or_else(|_| {
                    SocketSignal::Error(SocketErrorCode::Other(std::io::ErrorKind::Interrupted))
                }),
                None => match fallback {
                    Some(code) => SocketSignal::Error(code),
                    None => std::future::pending().await,
                },
            }
        })
    }

    fn wrap_socket(
        &self,
        socket: BoxedSocket,
        address: Option<&str>,
        port: Option<u16>,
    ) -> Result<Channel, TransportError> {
        let peer = target_label(address.unwrap_or("socket"), port);
        Ok(Channel::new(TransportKind::Socket, peer, ChannelTransport::Stream(socket)))
    }

    fn open_http(
        &self,
        connection_string: &str,
        _address: &str,
        _port: Option<u16>,
    ) -> Handshaking {
        self.handshake(TransportKind::Http, connection_string)
    }

    fn open_websocket(
        &self,
        connection_string: &str,
        _address: &str,
        _port: Option<u16>,
    ) -> Handshaking {
        self.handshake(TransportKind::WebSocket, connection_string)
    }

    fn open_inproc(&self, channel_id: &str) -> Result<Channel, TransportError> {
        self.immediate(TransportKind::InProc, channel_id)
    }

    fn spawn_process(&self, command: &str, _args: &[String]) -> Result<Channel, TransportError> {
        self.immediate(TransportKind::Process, command)
    }

    fn attach_external_process(
        &self,
        command: &str,
        _args: &[String],
    ) -> Result<Channel, TransportError> {
        self.immediate(TransportKind::ExternalProcess, command)
    }
}
