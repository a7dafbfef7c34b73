use crate::base::neterror::TransportError;
use crate::channel::Channel;
use std::fmt;
use futures::future::BoxFuture;
use std::future::IntoFuture;
use tokio::sync::watch;

/// What a settled [`PendingResult`] holds.
pub type Outcome = Result<Channel, TransportError>;

/// Single-resolution future over a channel or an error.
///
/// Clones observe the same result. Observers may attach before or after
/// settlement; a late observer gets the settled outcome immediately.
#[derive(Clone)]
pub struct PendingResult {
    rx: watch::Receiver<Option<Outcome>>,
}

/// The write side of a [`PendingResult`]. Only the first `settle` wins.
pub(crate) struct Settler {
    tx: watch::Sender<Option<Outcome>>,
}

impl Settler {
    /// Transition pending -> settled. Returns `false` if already settled.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        let mut outcome = Some(outcome);
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = outcome.take();
            true
        })
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub(crate) fn result(&self) -> PendingResult {
        PendingResult { rx: self.tx.subscribe() }
    }
}

impl PendingResult {
    pub(crate) fn new() -> (Settler, PendingResult) {
        let (tx, rx) = watch::channel(None);
        (Settler { tx }, PendingResult { rx })
    }

    /// An already-settled result.
    pub fn ready(outcome: Outcome) -> Self {
        let (tx, rx) = watch::channel(Some(outcome));
        drop(tx);
        PendingResult { rx }
    }

    pub fn resolved(channel: Channel) -> Self {
        Self::ready(Ok(channel))
    }

    pub fn rejected(error: TransportError) -> Self {
        Self::ready(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The outcome, if settled.
    pub fn peek(&self) -> Option<Outcome> {
        (*self.rx.borrow()).clone()
    }

    /// Wait for settlement.
    ///
    /// If the writer goes away without settling, yields
    /// [`TransportError::Abandoned`].
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.rx.clone();
        let settled = match rx.wait_for(Option::is_some).await {
            Ok(state) => (*state).clone(),
            Err(_) => None,
        };
        settled.unwrap_or(Err(TransportError::Abandoned))
    }

    /// Whether both handles observe the same underlying result.
    pub fn same_result(&self, other: &PendingResult) -> bool {
        self.rx.same_channel(&other.rx)
    }
}

impl IntoFuture for PendingResult {
    type Output = Outcome;
    type IntoFuture = BoxFuture<'static, Outcome>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

impl fmt::Debug for PendingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.rx.borrow() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("PendingResult").field("state", &state).finish()
    }
}
