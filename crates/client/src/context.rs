//! Session context: wiring and lifecycle.
//!
//! # Architecture
//!
//! [`SessionContext`] assembles the auth session, guest bootstrapper, and cart
//! synchronizer around one store and one event bus, and owns the session
//! lifecycle: initialization, login, logout, and the background loops. It is
//! the only type an embedding application needs to hold.
//!
//! Identity transitions never tear the context down; [`reinitialize`] replays
//! the initialization sequence in place (restore identity, ensure a guest
//! session, fetch the cart) against whatever is now persisted.
//!
//! [`reinitialize`]: SessionContext::reinitialize

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use pasar_core::GuestId;

use crate::api::{ApiError, CommerceBackend};
use crate::auth::{AuthSession, LoginReport};
use crate::cart::CartSync;
use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::events::{EventBus, SessionEvent};
use crate::guest::GuestSession;
use crate::models::{CartSnapshot, Identity, LoginOutcome};
use crate::store::{SessionStore, keys};

/// The assembled client session.
pub struct SessionContext<B> {
    config: ClientConfig,
    bus: EventBus,
    auth: Arc<AuthSession<B>>,
    guest: GuestSession<B>,
    cart: CartSync<B>,
}

impl<B: CommerceBackend> SessionContext<B> {
    /// Wire a context from its parts. No I/O happens until
    /// [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(config: ClientConfig, backend: Arc<B>, store: Arc<dyn SessionStore>) -> Self {
        let bus = EventBus::new();
        let auth = Arc::new(AuthSession::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            bus.clone(),
            config.token_expiry_buffer,
        ));
        let guest = GuestSession::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            bus.clone(),
            Arc::clone(&auth),
        );
        let cart = CartSync::new(backend, store, Arc::clone(&auth), config.fetch_throttle);
        Self {
            config,
            bus,
            auth,
            guest,
            cart,
        }
    }

    /// Bring the session up from persisted state: restore the identity,
    /// bootstrap a guest session when unauthenticated, and fetch the cart.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> CartSnapshot {
        self.auth.restore();
        self.guest.ensure().await;
        self.cart.fetch().await
    }

    /// Replay initialization against the current persisted state. Used after
    /// identity transitions instead of tearing the context down.
    pub async fn reinitialize(&self) -> CartSnapshot {
        info!("reinitializing session");
        self.initialize().await
    }

    /// Log in with an authentication result and reconcile the cart.
    ///
    /// The guest cart handoff (merge or clear) happens inside
    /// [`AuthSession::login`]; the forced refresh afterwards makes the merged
    /// cart visible immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] when the outcome carries no token.
    pub async fn login(&self, outcome: LoginOutcome) -> Result<LoginReport, AuthError> {
        let report = self.auth.login(outcome).await?;
        self.cart.force_refresh().await;
        Ok(report)
    }

    /// Log out, reset the cart, and come back up as a fresh guest.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.cart.clear_local();
        self.reinitialize().await;
    }

    /// Discard the current guest identity and issue a new one, e.g. when the
    /// backend reports the guest session as no longer valid.
    ///
    /// # Errors
    ///
    /// Returns the backend error when no new identifier could be obtained;
    /// the old identity is already discarded at that point.
    pub async fn renew_guest_session(&self) -> Result<GuestId, ApiError> {
        let guest_id = self.guest.issue_new().await?;
        // issue_new announced the key change; reconcile the cart here so
        // callers see the new scope immediately even without an event loop
        self.cart.force_refresh().await;
        Ok(guest_id)
    }

    /// Handle one session signal.
    pub async fn dispatch(&self, event: SessionEvent) {
        match &event {
            SessionEvent::CreateGuestSession => {
                self.guest.ensure().await;
            }
            SessionEvent::RoleChanged { .. } => {
                self.reinitialize().await;
            }
            // A token or user record change from another context means the
            // identity moved under us
            SessionEvent::StorageChanged { key, .. }
                if key == keys::TOKEN || key == keys::USER =>
            {
                self.reinitialize().await;
            }
            _ => {}
        }
        self.cart.handle_event(&event).await;
    }

    /// Consume bus signals until the bus closes. Usually run via
    /// [`spawn_background`](Self::spawn_background).
    pub async fn run_event_loop(&self) {
        let mut rx = self.bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) => self.dispatch(event).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event loop lagged, signals dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Spawn the event loop and the periodic verification loop.
    pub fn spawn_background(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let ctx = Arc::clone(self);
        let events = tokio::spawn(async move { ctx.run_event_loop().await });

        let ctx = Arc::clone(self);
        let verify = tokio::spawn(async move {
            let mut interval = tokio::time::interval(ctx.config.verify_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately; skip it so verification
            // starts one full interval after startup
            interval.tick().await;
            loop {
                interval.tick().await;
                ctx.auth.verification_tick().await;
            }
        });
        (events, verify)
    }

    /// Emit a signal onto the session bus (e.g. a storage change observed by
    /// the embedding application).
    pub fn emit(&self, event: SessionEvent) {
        self.bus.emit(event);
    }

    /// The active identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.auth.identity()
    }

    /// The current cart snapshot.
    #[must_use]
    pub fn cart_snapshot(&self) -> CartSnapshot {
        self.cart.snapshot()
    }

    /// The auth session manager.
    #[must_use]
    pub fn auth(&self) -> &AuthSession<B> {
        &self.auth
    }

    /// The cart synchronizer.
    #[must_use]
    pub fn cart(&self) -> &CartSync<B> {
        &self.cart
    }

    /// The guest session bootstrapper.
    #[must_use]
    pub fn guest(&self) -> &GuestSession<B> {
        &self.guest
    }
}
