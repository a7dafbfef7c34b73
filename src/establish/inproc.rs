use crate::base::kind::TransportKind;
use crate::channel::{BoxedSocket, Channel, ChannelTransport};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::io::DuplexStream;

const INPROC_BUFFER: usize = 64 * 1024;

/// Rendezvous point for in-process channels.
///
/// Opening a channel id hands one end of a duplex pipe to the opener and parks
/// the other end until someone accepts the same id.
#[derive(Clone, Default)]
pub struct InProcHub {
    parked: Arc<DashMap<String, DuplexStream>>,
}

impl InProcHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the opener's end of `channel_id`. A previously parked, never
    /// accepted peer for the same id is replaced.
    pub fn open(&self, channel_id: &str) -> Channel {
        let (near, far) = tokio::io::duplex(INPROC_BUFFER);
        if self.parked.insert(channel_id.to_string(), far).is_some() {
            tracing::debug!(channel_id, "replacing unaccepted in-process peer");
        }
        Channel::new(
            TransportKind::InProc,
            channel_id,
            ChannelTransport::Stream(BoxedSocket::new(near)),
        )
    }

    /// Take the parked end of `channel_id`, if any.
    pub fn accept(&self, channel_id: &str) -> Option<BoxedSocket> {
        self.parked.remove(channel_id).map(|(_, far)| BoxedSocket::new(far))
    }

    pub fn pending_count(&self) -> usize {
        self.parked.len()
    }
}
