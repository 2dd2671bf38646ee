//! Event notifications for state changes.
//!
//! The core exposes synchronous query methods plus this broadcast channel so
//! an embedding layer can observe lock/unlock and entry changes without the
//! core holding any reference to it.

use tokio::sync::broadcast;
use uuid::Uuid;

/// State-change notifications emitted by the vault services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    Unlocked,
    Locked,
    EntryAdded(Uuid),
    EntryRemoved(Uuid),
}

/// Broadcast bus for [`VaultEvent`]s.
///
/// Sends are best-effort: with no subscribers the event is dropped, and a
/// lagging subscriber misses events rather than blocking the vault.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<VaultEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; never fails.
    pub fn publish(&self, event: VaultEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
