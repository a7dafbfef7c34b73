/// The current state of a connection slot.
/// Connected and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// An attempt is in flight.
    #[default]
    Connecting,

    /// The last attempt failed transiently; waiting out the retry delay.
    Retrying,

    /// The attempt succeeded and the result resolved with a channel.
    Connected,

    /// The result was rejected (fatal error, shutdown or destroy).
    Rejected,
}

impl SlotState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SlotState::Connected | SlotState::Rejected)
    }
}
