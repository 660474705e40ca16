//! Typed in-process event bus.
//!
//! Cross-component coordination between the auth session manager, the guest
//! bootstrapper, and the cart synchronizer happens through a closed set of
//! event variants over a broadcast channel. Signals are fire-and-forget: no
//! acknowledgment, no ordering guarantee between listeners, and emitting
//! with no subscribers is not an error.

use tokio::sync::broadcast;

use pasar_core::RoleId;

/// Buffer size for the broadcast channel. Ample for the handful of signals a
/// session transition produces.
const CHANNEL_CAPACITY: usize = 32;

/// The closed set of session signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Cached cart state is known stale (e.g. after login merge); refetch
    /// bypassing the throttle.
    ForceCartRefresh,
    /// Reset the local cart to empty (e.g. after logout).
    ForceCartReset,
    /// Request a guest session to be bootstrapped if none exists.
    CreateGuestSession,
    /// The backend reported a different role than the cached one.
    RoleChanged { role: RoleId },
    /// A persisted key changed outside this context (cross-tab storage sync).
    StorageChanged {
        key: String,
        old: Option<String>,
        new: Option<String>,
    },
}

/// Cloneable handle to the session event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emit a signal to all current subscribers. Fire-and-forget.
    pub fn emit(&self, event: SessionEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }

    /// Subscribe to signals emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
