//! Cart synchronization.
//!
//! # Architecture
//!
//! [`CartSync`] holds the in-memory [`CartSnapshot`] and keeps it reconciled
//! with the backend. A fetch reads lines, count, and total in parallel and
//! replaces the snapshot wholesale; there is no line-level patching. Fetches
//! are throttled through a persisted timestamp so rapid navigation does not
//! hammer the backend, and every fetch carries a generation number so a slow
//! response can never overwrite the result of a newer one.
//!
//! Mutations go to the backend first and re-fetch on success; the local
//! snapshot is never optimistically edited. Fetch failures degrade to the
//! cached snapshot and surface nothing to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::join;
use tracing::{debug, instrument, warn};

use pasar_core::{CartEntryId, CatalogId, SizeId};

use crate::api::CommerceBackend;
use crate::auth::AuthSession;
use crate::error::{CartError, messages, mutation_failure, update_failure};
use crate::events::SessionEvent;
use crate::models::CartSnapshot;
use crate::store::{
    SessionStore, clear_cached_cart, keys, read_cached_cart, read_last_fetch_ms,
    write_cached_cart, write_last_fetch_ms,
};

/// Keeps the local cart snapshot reconciled with the backend.
pub struct CartSync<B> {
    backend: Arc<B>,
    store: Arc<dyn SessionStore>,
    auth: Arc<AuthSession<B>>,
    state: Mutex<CartSnapshot>,
    /// Monotonic fetch generation; only the newest generation may commit.
    generation: AtomicU64,
    throttle: Duration,
}

impl<B: CommerceBackend> CartSync<B> {
    pub fn new(
        backend: Arc<B>,
        store: Arc<dyn SessionStore>,
        auth: Arc<AuthSession<B>>,
        throttle: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            auth,
            state: Mutex::new(CartSnapshot::empty()),
            generation: AtomicU64::new(0),
            throttle,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.state.lock().clone()
    }

    /// Throttled reconciliation with the backend.
    ///
    /// Within the throttle window this is a no-op returning the current
    /// snapshot. On failure the cached snapshot (or empty) is installed and
    /// returned; fetching never errors.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> CartSnapshot {
        let now_ms = Utc::now().timestamp_millis();
        if let Some(last) = read_last_fetch_ms(&*self.store) {
            let elapsed = now_ms.saturating_sub(last);
            if u128::try_from(elapsed).is_ok_and(|e| e < self.throttle.as_millis()) {
                debug!(elapsed_ms = elapsed, "within throttle window, skipping fetch");
                return self.snapshot();
            }
        }

        let generation = self.next_generation();
        match self.fetch_snapshot(false).await {
            Some(snapshot) => {
                if self.commit(generation, snapshot.clone()) {
                    write_last_fetch_ms(&*self.store, now_ms);
                }
                snapshot
            }
            None => {
                let fallback = read_cached_cart(&*self.store).unwrap_or_default();
                warn!("cart fetch failed, falling back to cached snapshot");
                self.commit_state_only(generation, fallback.clone());
                fallback
            }
        }
    }

    /// Unthrottled reconciliation, bypassing backend caches.
    ///
    /// Returns the fresh item count, or 0 when the fetch failed. Neither the
    /// throttle stamp nor, on failure, the snapshot is touched.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> u32 {
        let generation = self.next_generation();
        match self.fetch_snapshot(true).await {
            Some(snapshot) => {
                let count = snapshot.count;
                self.commit(generation, snapshot);
                count
            }
            None => {
                warn!("forced cart refresh failed");
                0
            }
        }
    }

    /// Add an item to the cart and re-fetch.
    ///
    /// # Errors
    ///
    /// Returns a user-ready [`CartError`]: the localized rejection when the
    /// backend refused the item, a generic message otherwise.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        catalog: CatalogId,
        size: SizeId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::Rejected(messages::QUANTITY_TOO_LOW.to_owned()));
        }
        self.backend
            .add_to_cart(self.auth.cart_scope(), catalog, size, quantity)
            .await
            .map_err(|err| {
                warn!(error = %err, "add to cart failed");
                mutation_failure(&err, messages::ADD_FAILED)
            })?;
        self.force_refresh().await;
        Ok(())
    }

    /// Set a line's quantity and re-fetch.
    ///
    /// # Errors
    ///
    /// Returns a user-ready [`CartError`]; insufficient-stock rejections are
    /// localized with the line's product and size names.
    #[instrument(skip(self))]
    pub async fn update_entry(
        &self,
        entry: CartEntryId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::Rejected(messages::QUANTITY_TOO_LOW.to_owned()));
        }
        self.backend
            .update_cart_entry(self.auth.cart_scope(), entry, quantity)
            .await
            .map_err(|err| {
                warn!(error = %err, "cart update failed");
                update_failure(&err)
            })?;
        self.force_refresh().await;
        Ok(())
    }

    /// Remove a line and re-fetch.
    ///
    /// # Errors
    ///
    /// Returns a user-ready [`CartError`].
    #[instrument(skip(self))]
    pub async fn remove_entry(&self, entry: CartEntryId) -> Result<(), CartError> {
        self.backend
            .remove_cart_entry(self.auth.cart_scope(), entry)
            .await
            .map_err(|err| {
                warn!(error = %err, "cart removal failed");
                mutation_failure(&err, messages::REMOVE_FAILED)
            })?;
        self.force_refresh().await;
        Ok(())
    }

    /// Reset the local snapshot and cache to empty. No backend call.
    pub fn clear_local(&self) {
        // Invalidate any in-flight fetch so it cannot resurrect the old cart
        self.next_generation();
        *self.state.lock() = CartSnapshot::empty();
        clear_cached_cart(&*self.store);
        self.store.remove(keys::CART_LAST_FETCH);
    }

    /// React to a session signal.
    pub async fn handle_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::ForceCartRefresh => {
                self.force_refresh().await;
            }
            SessionEvent::ForceCartReset => self.clear_local(),
            SessionEvent::StorageChanged { key, old, new }
                if key == keys::GUEST_ID && old != new =>
            {
                // Another context replaced the guest identity; nothing cached
                // under the old one is valid
                self.clear_local();
                self.force_refresh().await;
            }
            _ => {}
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Read lines, count, and total in parallel. All-or-nothing: any failed
    /// part discards the whole read.
    async fn fetch_snapshot(&self, force: bool) -> Option<CartSnapshot> {
        let scope = self.auth.cart_scope();
        let (items, count, total) = join!(
            self.backend.cart_items(scope, force),
            self.backend.cart_count(scope, force),
            self.backend.cart_total(scope, force),
        );
        match (items, count, total) {
            (Ok(items), Ok(count), Ok(total)) => {
                let lines = items.into_iter().map(crate::api::types::CartItemWire::into_line);
                Some(CartSnapshot::from_parts(lines.collect(), count, total))
            }
            (items, count, total) => {
                let failed = [items.is_err(), count.is_err(), total.is_err()]
                    .iter()
                    .filter(|f| **f)
                    .count();
                debug!(failed_parts = failed, "partial cart read discarded");
                None
            }
        }
    }

    /// Install a snapshot and persist it, unless a newer fetch has started.
    fn commit(&self, generation: u64, snapshot: CartSnapshot) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("fetch superseded, discarding result");
            return false;
        }
        write_cached_cart(&*self.store, &snapshot);
        *self.state.lock() = snapshot;
        true
    }

    /// Install a snapshot without persisting it (cache fallback path).
    fn commit_state_only(&self, generation: u64, snapshot: CartSnapshot) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("fetch superseded, discarding fallback");
            return;
        }
        *self.state.lock() = snapshot;
    }
}
