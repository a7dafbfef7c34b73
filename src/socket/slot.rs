//! Connection slot state machine.
//!
//! A slot owns the single in-flight attempt for one key of one deduplicating
//! transport kind:
//!
//! ```text
//! Connecting ──ok──────────────▶ Connected
//!     │  ▲
//!     │  └── delay ── Retrying ◀─ transient error (sockets only)
//!     └──fatal / destroy───────▶ Rejected
//! ```
//!
//! Both terminal transitions go through [`Slot::settle`], which unregisters
//! the slot and then settles its [`PendingResult`]. Only the first terminal
//! transition is observable.

use crate::base::kind::TransportKind;
use crate::base::loadstate::SlotState;
use crate::base::neterror::{classify, Classification, TransportError};
use crate::channel::ChannelTracker;
use crate::establish::{target_label, Establish, SocketSignal};
use crate::socket::pending::{Outcome, PendingResult, Settler};
use crate::socket::registry::Registry;
use crate::socket::retry::RetryPolicy;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::AbortHandle;

/// What a slot connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTarget {
    Socket { address: String, port: Option<u16> },
    Http { connection_string: String, address: String, port: Option<u16> },
    WebSocket { connection_string: String, address: String, port: Option<u16> },
}

impl SlotTarget {
    /// The registry key for this target.
    pub fn key(&self) -> String {
        match self {
            SlotTarget::Socket { address, port } => target_label(address, *port),
            SlotTarget::Http { connection_string, .. }
            | SlotTarget::WebSocket { connection_string, .. } => connection_string.clone(),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            SlotTarget::Socket { .. } => TransportKind::InitiatingSocket,
            SlotTarget::Http { .. } => TransportKind::Http,
            SlotTarget::WebSocket { .. } => TransportKind::WebSocket,
        }
    }

    fn destination(&self) -> (String, Option<u16>) {
        match self {
            SlotTarget::Socket { address, port }
            | SlotTarget::Http { address, port, .. }
            | SlotTarget::WebSocket { address, port, .. } => (address.clone(), *port),
        }
    }
}

/// Everything a slot needs from its factory.
#[derive(Clone)]
pub struct SlotContext {
    pub establisher: Arc<dyn Establish>,
    pub policy: RetryPolicy,
    /// Delivered channels are handed to this tracker, if any.
    pub tracker: Option<ChannelTracker>,
}

impl SlotContext {
    pub fn new(establisher: Arc<dyn Establish>) -> Self {
        Self { establisher, policy: RetryPolicy::default(), tracker: None }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tracker(mut self, tracker: ChannelTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }
}

struct SlotCore {
    state: SlotState,
    attempt: Option<AbortHandle>,
}

/// One in-flight (or retrying) connection attempt.
pub struct Slot {
    key: String,
    target: SlotTarget,
    settler: Settler,
    core: Mutex<SlotCore>,
    retries: AtomicUsize,
    registry: Weak<Registry>,
    ctx: SlotContext,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key)
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("retries", &self.retry_count())
            .finish()
    }
}

impl Slot {
    /// Return the live slot for `target` in `registry`, creating, registering
    /// and connecting a new one if there is none. The flag is `true` for a
    /// new slot.
    ///
    /// `gate` runs after a new slot is registered and before it connects; an
    /// error destroys the slot without ever reaching the establisher.
    pub fn open(
        registry: &Arc<Registry>,
        target: SlotTarget,
        ctx: &SlotContext,
        gate: impl Fn() -> Option<TransportError>,
    ) -> (Arc<Slot>, bool) {
        let key = target.key();
        loop {
            let (slot, created) = registry.get_or_insert_with(&key, || {
                Slot::new(Arc::downgrade(registry), target.clone(), ctx.clone())
            });
            if created {
                tracing::debug!(key = %key, kind = %slot.kind(), "new connection slot");
                match gate() {
                    Some(err) => {
                        slot.destroy(err);
                    }
                    None => slot.connect(),
                }
                return (slot, true);
            }
            if !slot.is_settled() {
                tracing::debug!(key = %key, kind = %slot.kind(), "joining in-flight slot");
                return (slot, false);
            }
            // Settled but not yet unregistered; drop it and look again.
            registry.remove_slot(&slot);
        }
    }

    /// Create an unregistered, idle slot.
    pub fn new(registry: Weak<Registry>, target: SlotTarget, ctx: SlotContext) -> Arc<Slot> {
        let (settler, _) = PendingResult::new();
        Arc::new(Slot {
            key: target.key(),
            target,
            settler,
            core: Mutex::new(SlotCore { state: SlotState::Connecting, attempt: None }),
            retries: AtomicUsize::new(0),
            registry,
            ctx,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> TransportKind {
        self.target.kind()
    }

    pub fn target(&self) -> &SlotTarget {
        &self.target
    }

    pub fn state(&self) -> SlotState {
        self.core().state
    }

    /// Number of transient failures absorbed so far.
    pub fn retry_count(&self) -> usize {
        self.retries.load(Ordering::Relaxed)
    }

    /// A new observer of this slot's result.
    pub fn result(&self) -> PendingResult {
        self.settler.result()
    }

    pub fn is_settled(&self) -> bool {
        self.settler.is_settled()
    }

    /// Whether an attempt task is currently attached.
    pub fn has_attempt(&self) -> bool {
        self.core().attempt.is_some()
    }

    fn core(&self) -> MutexGuard<'_, SlotCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the attempt task.
    ///
    /// Connecting a slot that already has a live attempt or a delivered
    /// channel is a programmer error and rejects the slot with
    /// [`TransportError::AlreadyConnected`].
    pub fn connect(self: &Arc<Self>) {
        let mut core = self.core();
        if core.attempt.is_some() || core.state == SlotState::Connected {
            let running = core.attempt.take();
            drop(core);
            let (address, port) = self.target.destination();
            tracing::debug!(key = %self.key, "connect called on a connected slot");
            self.settle(Err(TransportError::AlreadyConnected { address, port }));
            if let Some(running) = running {
                running.abort();
            }
            return;
        }
        if core.state.is_terminal() {
            return;
        }
        let slot = Arc::clone(self);
        // Spawned under the lock so the task cannot settle before the handle is stored.
        let task = tokio::spawn(async move { slot.drive().await });
        core.attempt = Some(task.abort_handle());
    }

    /// Move to a terminal state, unregister and settle the result.
    /// Returns `false` if the slot had already settled.
    pub fn settle(&self, outcome: Outcome) -> bool {
        {
            let mut core = self.core();
            if core.state.is_terminal() {
                return false;
            }
            core.state = if outcome.is_ok() { SlotState::Connected } else { SlotState::Rejected };
            // Cleared, not aborted: settle may run on the attempt task itself.
            core.attempt = None;
        }
        self.unregister();
        self.settler.settle(outcome)
    }

    /// Reject with `reason` if still pending, abort any attempt and
    /// unregister. Idempotent.
    pub fn destroy(&self, reason: TransportError) -> bool {
        let attempt = {
            let mut core = self.core();
            if core.state.is_terminal() {
                drop(core);
                self.unregister();
                return false;
            }
            core.state = SlotState::Rejected;
            core.attempt.take()
        };
        if let Some(attempt) = attempt {
            attempt.abort();
        }
        tracing::debug!(key = %self.key, reason = %reason, "destroying slot");
        self.unregister();
        self.settler.settle(Err(reason))
    }

    fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_slot(self);
        }
    }

    /// Retrying -> Connecting. `false` once terminal.
    fn begin_attempt(&self) -> bool {
        let mut core = self.core();
        if core.state.is_terminal() {
            return false;
        }
        core.state = SlotState::Connecting;
        true
    }

    /// Connecting -> Retrying. `false` once terminal.
    fn enter_retry(&self) -> bool {
        let mut core = self.core();
        if core.state.is_terminal() {
            return false;
        }
        core.state = SlotState::Retrying;
        self.retries.fetch_add(1, Ordering::Relaxed);
        true
    }

    async fn drive(self: Arc<Self>) {
        let establisher = Arc::clone(&self.ctx.establisher);
        match &self.target {
            SlotTarget::Socket { address, port } => self.drive_socket(address, *port).await,
            SlotTarget::Http { connection_string, address, port } => {
                let outcome = establisher.open_http(connection_string, address, *port).await;
                self.finish(outcome);
            }
            SlotTarget::WebSocket { connection_string, address, port } => {
                let outcome = establisher.open_websocket(connection_string, address, *port).await;
                self.finish(outcome);
            }
        }
    }

    async fn drive_socket(&self, address: &str, port: Option<u16>) {
        let establisher = &self.ctx.establisher;
        let policy = self.ctx.policy;
        let mut attempts = 0usize;

        loop {
            if !self.begin_attempt() {
                return;
            }
            attempts += 1;

            let code = match establisher.open_socket(address, port).await {
                SocketSignal::Connected(socket) => {
                    let outcome = establisher.wrap_socket(socket, Some(address), port);
                    self.finish(outcome);
                    return;
                }
                SocketSignal::Error(code) => code,
            };

            match classify(code, TransportKind::InitiatingSocket.protocol(), address, port) {
                Classification::Fatal(err) => {
                    tracing::debug!(key = %self.key, error = %err, "fatal connect error");
                    self.finish(Err(err));
                    return;
                }
                Classification::Transient => {
                    if !policy.should_retry(attempts) {
                        self.finish(Err(TransportError::TooManyRetries {
                            address: address.to_string(),
                            port,
                            attempts,
                        }));
                        return;
                    }
                    if !self.enter_retry() {
                        return;
                    }
                    tracing::debug!(
                        key = %self.key,
                        attempt = attempts,
                        code = ?code,
                        delay_ms = policy.delay.as_millis() as u64,
                        "transient connect error, retrying"
                    );
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    fn finish(&self, outcome: Outcome) {
        match outcome {
            Ok(channel) => {
                if let Some(tracker) = &self.ctx.tracker {
                    tracker.track(&channel);
                }
                if !self.settle(Ok(channel.clone())) {
                    // Lost to destroy; nobody will receive this channel.
                    channel.close();
                }
            }
            Err(err) => {
                self.settle(Err(err));
            }
        }
    }
}
