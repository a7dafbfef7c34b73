use crate::channel::handle::{Channel, WeakChannel};
use dashmap::DashMap;
use std::sync::Arc;

/// Keeps weak references to delivered channels until they close, so that a
/// shutdown can close whatever is still open.
#[derive(Clone, Default)]
pub struct ChannelTracker {
    live: Arc<DashMap<u64, WeakChannel>>,
}

impl ChannelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `channel`. The entry is dropped when the channel's
    /// about-to-close notification fires or the channel itself is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn track(&self, channel: &Channel) {
        if channel.is_closed() {
            return;
        }
        let id = channel.id();
        let mut closing = channel.about_to_close();
        self.live.insert(id, channel.downgrade());

        let live = Arc::clone(&self.live);
        tokio::spawn(async move {
            let _ = closing.wait_for(|closed| *closed).await;
            live.remove(&id);
        });
    }

    /// Number of tracked channels that have not closed yet.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Close every tracked channel. Returns how many were closed by this call.
    pub fn close_all(&self) -> usize {
        // Snapshot first: closing removes entries from the map.
        let snapshot: Vec<WeakChannel> = self.live.iter().map(|e| e.value().clone()).collect();
        self.live.clear();
        snapshot
            .into_iter()
            .filter_map(|weak| weak.upgrade())
            .filter(|channel| channel.close())
            .count()
    }
}
