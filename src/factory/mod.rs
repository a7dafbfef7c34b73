//! Transport factory.
//!
//! [`Factory`] is the public entry point: it turns a [`TransportRequest`] into
//! a [`PendingResult`]. Requests for the deduplicating kinds (`initiatingsocket`,
//! `http`, `ws`) share one in-flight attempt per key; every other kind is
//! handed straight to the [`Establish`] implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use transportnet::factory::{Factory, TransportRequest};
//!
//! let factory = Factory::builder().max_connect_attempts(20).build();
//! let first = factory.request(TransportRequest::initiating_socket("127.0.0.1", 7000));
//! let second = factory.request_tagged("initiatingsocket", &["127.0.0.1", "7000"]);
//! assert!(first.same_result(&second));
//!
//! let channel = first.await?;
//! factory.shutdown("exiting");
//! ```

pub mod config;
pub mod request;
pub mod shutdown;

pub use config::FactoryConfig;
pub use request::TransportRequest;
pub use shutdown::ShutdownBroadcaster;

use crate::base::kind::TransportKind;
use crate::base::neterror::TransportError;
use crate::channel::ChannelTracker;
use crate::establish::{Establish, SystemEstablisher};
use crate::socket::pending::PendingResult;
use crate::socket::registry::Registry;
use crate::socket::slot::{Slot, SlotContext, SlotTarget};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Keyed connection factory.
///
/// Cheap to clone; clones share registries and shutdown state. Dropping the
/// last clone rejects every outstanding attempt with
/// [`FactoryConfig::shutdown_reason`]; channels already delivered stay open.
#[derive(Clone)]
pub struct Factory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    config: FactoryConfig,
    ctx: SlotContext,
    sockets: Arc<Registry>,
    http: Arc<Registry>,
    websockets: Arc<Registry>,
    tracker: ChannelTracker,
    shutdown: ShutdownBroadcaster,
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("closed", &self.is_closed())
            .field("sockets", &self.inner.sockets.len())
            .field("http", &self.inner.http.len())
            .field("websockets", &self.inner.websockets.len())
            .finish()
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    /// Factory backed by [`SystemEstablisher`] with default configuration.
    pub fn new() -> Self {
        FactoryBuilder::new().build()
    }

    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    pub fn with_establisher(establisher: Arc<dyn Establish>) -> Self {
        FactoryBuilder::new().establisher(establisher).build()
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_closed()
    }

    /// The registry for a deduplicating kind, `None` for the others.
    pub fn registry(&self, kind: TransportKind) -> Option<&Arc<Registry>> {
        match kind {
            TransportKind::InitiatingSocket => Some(&self.inner.sockets),
            TransportKind::Http => Some(&self.inner.http),
            TransportKind::WebSocket => Some(&self.inner.websockets),
            _ => None,
        }
    }

    /// Slots currently registered across all registries.
    pub fn pending_count(&self) -> usize {
        self.inner.registries().iter().map(|r| r.len()).sum()
    }

    /// Channels delivered by deduplicating kinds that are still open. Always
    /// zero unless `close_channels_on_shutdown` is set.
    pub fn live_channel_count(&self) -> usize {
        self.inner.tracker.live_count()
    }

    /// Request a channel.
    ///
    /// Never fails synchronously: validation and shutdown errors come back as
    /// an already-rejected [`PendingResult`].
    pub fn request(&self, request: TransportRequest) -> PendingResult {
        let kind = request.kind();
        match self.dispatch(request) {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(kind = %kind, error = %err, "transport request rejected");
                PendingResult::rejected(err)
            }
        }
    }

    /// Request a channel by kind tag and positional arguments.
    /// See [`TransportRequest::from_tag`].
    pub fn request_tagged(&self, tag: &str, args: &[&str]) -> PendingResult {
        if let Some(err) = self.inner.shutdown.error() {
            return PendingResult::rejected(err);
        }
        match TransportRequest::from_tag(tag, args) {
            Ok(request) => self.request(request),
            Err(err) => {
                tracing::debug!(tag, error = %err, "transport request rejected");
                PendingResult::rejected(err)
            }
        }
    }

    /// Reject every outstanding attempt with [`TransportError::ShutdownInProgress`]
    /// and refuse further requests. Returns `false` if already shut down.
    pub fn shutdown(&self, reason: impl Into<String>) -> bool {
        self.inner.broadcast(reason.into(), self.inner.config.close_channels_on_shutdown)
    }

    fn dispatch(&self, request: TransportRequest) -> Result<PendingResult, TransportError> {
        if let Some(err) = self.inner.shutdown.error() {
            return Err(err);
        }
        let establisher = &self.inner.ctx.establisher;

        let target = match request {
            TransportRequest::InProc { channel_id } => {
                return establisher.open_inproc(&channel_id).map(PendingResult::resolved)
            }
            TransportRequest::Socket { socket, address, port } => {
                return establisher
                    .wrap_socket(socket, address.as_deref(), port)
                    .map(PendingResult::resolved)
            }
            TransportRequest::Process { command, args } => {
                return establisher.spawn_process(&command, &args).map(PendingResult::resolved)
            }
            TransportRequest::ExternalProcess { command, args } => {
                return establisher
                    .attach_external_process(&command, &args)
                    .map(PendingResult::resolved)
            }
            TransportRequest::InitiatingSocket { address, port } => {
                request::slot_target(TransportKind::InitiatingSocket, address, port, None)?
            }
            TransportRequest::Http { connection_string, address, port } => {
                request::slot_target(TransportKind::Http, address, port, Some(connection_string))?
            }
            TransportRequest::WebSocket { connection_string, address, port } => {
                request::slot_target(
                    TransportKind::WebSocket,
                    address,
                    port,
                    Some(connection_string),
                )?
            }
        };
        Ok(self.open_slot(target))
    }

    fn open_slot(&self, target: SlotTarget) -> PendingResult {
        let registry = match target.kind() {
            TransportKind::InitiatingSocket => &self.inner.sockets,
            TransportKind::Http => &self.inner.http,
            _ => &self.inner.websockets,
        };
        // A shutdown that snapshotted the registry before this slot landed
        // would miss it; re-check before the establisher is involved.
        let shutdown = &self.inner.shutdown;
        let (slot, _) = Slot::open(registry, target, &self.inner.ctx, || shutdown.error());
        slot.result()
    }
}

impl FactoryInner {
    fn registries(&self) -> [&Arc<Registry>; 3] {
        [&self.sockets, &self.http, &self.websockets]
    }

    fn broadcast(&self, reason: String, close_channels: bool) -> bool {
        let Some(destroyed) = self.shutdown.fire(reason, &self.registries()) else {
            return false;
        };
        let closed = if close_channels { self.tracker.close_all() } else { 0 };
        tracing::info!(
            reason = self.shutdown.reason().unwrap_or_default(),
            slots = destroyed,
            channels = closed,
            "transport factory shut down"
        );
        true
    }
}

impl Drop for FactoryInner {
    fn drop(&mut self) {
        let reason = self.config.shutdown_reason.clone();
        self.broadcast(reason, false);
    }
}

/// Builder for [`Factory`].
#[must_use]
pub struct FactoryBuilder {
    config: FactoryConfig,
    establisher: Option<Arc<dyn Establish>>,
}

impl Default for FactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryBuilder {
    pub fn new() -> Self {
        Self { config: FactoryConfig::default(), establisher: None }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Delay between socket attempts after a transient error.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_retry_delay(delay);
        self
    }

    /// Give up with [`TransportError::TooManyRetries`] after this many attempts.
    pub fn max_connect_attempts(mut self, attempts: usize) -> Self {
        self.config = self.config.with_max_connect_attempts(attempts);
        self
    }

    pub fn shutdown_reason(mut self, reason: impl Into<String>) -> Self {
        self.config = self.config.with_shutdown_reason(reason);
        self
    }

    pub fn close_channels_on_shutdown(mut self, close: bool) -> Self {
        self.config = self.config.with_close_channels_on_shutdown(close);
        self
    }

    /// Use a custom establisher instead of [`SystemEstablisher`].
    pub fn establisher(mut self, establisher: Arc<dyn Establish>) -> Self {
        self.establisher = Some(establisher);
        self
    }

    pub fn build(self) -> Factory {
        let establisher =
            self.establisher.unwrap_or_else(|| Arc::new(SystemEstablisher::new()));
        let tracker = ChannelTracker::new();
        let mut ctx = SlotContext::new(establisher).with_policy(self.config.retry_policy());
        if self.config.close_channels_on_shutdown {
            ctx = ctx.with_tracker(tracker.clone());
        }
        Factory {
            inner: Arc::new(FactoryInner {
                config: self.config,
                ctx,
                sockets: Arc::new(Registry::new(TransportKind::InitiatingSocket)),
                http: Arc::new(Registry::new(TransportKind::Http)),
                websockets: Arc::new(Registry::new(TransportKind::WebSocket)),
                tracker,
                shutdown: ShutdownBroadcaster::new(),
            }),
        }
    }
}
