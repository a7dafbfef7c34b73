//! Live channel handles.
//!
//! - [`Channel`]: cloneable handle over one live transport
//! - [`BoxedSocket`]: byte-stream transports (TCP, IPC, in-process)
//! - [`ChannelTracker`]: closes still-open channels on shutdown

mod handle;
mod stream;
mod tracker;

pub use handle::{Channel, ChannelTransport, HttpSender, WsStream};
pub use stream::{BoxedSocket, StreamSocket};
pub use tracker::ChannelTracker;
