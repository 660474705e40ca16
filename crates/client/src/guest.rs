//! Guest session bootstrapping.
//!
//! Unauthenticated visitors get a server-issued guest identifier so their cart
//! survives across visits. The identifier is requested once, persisted, and
//! reused; it is never created while a token is present.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use pasar_core::GuestId;

use crate::api::{ApiError, CommerceBackend};
use crate::auth::AuthSession;
use crate::events::{EventBus, SessionEvent};
use crate::store::{SessionStore, keys};

/// Bootstraps and persists the guest identifier.
pub struct GuestSession<B> {
    backend: Arc<B>,
    store: Arc<dyn SessionStore>,
    bus: EventBus,
    auth: Arc<AuthSession<B>>,
}

impl<B: CommerceBackend> GuestSession<B> {
    pub fn new(
        backend: Arc<B>,
        store: Arc<dyn SessionStore>,
        bus: EventBus,
        auth: Arc<AuthSession<B>>,
    ) -> Self {
        Self {
            backend,
            store,
            bus,
            auth,
        }
    }

    /// Ensure a guest identifier exists for an unauthenticated session.
    ///
    /// No-op when a token is present or an identifier is already cached. A
    /// request failure leaves the session without an identifier; the next
    /// call retries.
    #[instrument(skip(self))]
    pub async fn ensure(&self) -> Option<GuestId> {
        if self.store.get(keys::TOKEN).is_some() {
            debug!("token present, skipping guest session");
            return None;
        }
        if let Some(cached) = self.store.get(keys::GUEST_ID) {
            let guest_id = GuestId::new(cached);
            self.auth.set_guest_id(guest_id.clone());
            return Some(guest_id);
        }
        match self.request_and_persist().await {
            Ok(guest_id) => Some(guest_id),
            Err(err) => {
                warn!(error = %err, "guest session request failed");
                None
            }
        }
    }

    /// Discard the current guest identity and issue a fresh one.
    ///
    /// The cached cart keys are cleared first so no snapshot from the old
    /// identity leaks into the new one. Subscribers are notified of the key
    /// change the same way a cross-tab storage event would report it.
    #[instrument(skip(self))]
    pub async fn issue_new(&self) -> Result<GuestId, ApiError> {
        let old = self.store.get(keys::GUEST_ID);
        self.store.remove(keys::GUEST_ID);
        crate::store::clear_cached_cart(&*self.store);
        self.store.remove(keys::CART_LAST_FETCH);

        let guest_id = self.request_and_persist().await?;
        self.bus.emit(SessionEvent::StorageChanged {
            key: keys::GUEST_ID.to_owned(),
            old,
            new: Some(guest_id.as_str().to_owned()),
        });
        Ok(guest_id)
    }

    async fn request_and_persist(&self) -> Result<GuestId, ApiError> {
        let guest_id = self.backend.guest_session().await?;
        self.store.set(keys::GUEST_ID, guest_id.as_str());
        self.auth.set_guest_id(guest_id.clone());
        debug!(guest_id = %guest_id, "guest session established");
        Ok(guest_id)
    }
}
