//! Authenticated session management.
//!
//! # Architecture
//!
//! [`AuthSession`] owns the active [`Identity`] and every transition between
//! guest and authenticated. Login is the critical path: the guest cart is
//! handed off (merged or cleared) against the backend *before* the guest-scoped
//! keys are purged, so a crash mid-transition can lose at worst the purge, not
//! the cart. Handoff failures are reported, never blocking: the user ends up
//! logged in either way and a forced refresh reconciles the visible cart.
//!
//! Background verification re-checks the token expiry and the server-side role
//! on an interval; both checks fail silent on transport errors so a flaky
//! network never logs anyone out. Only an explicit 401 tears the session down.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use pasar_core::{GuestId, RoleId, UserId};

use crate::api::{ApiError, CartScope, CommerceBackend};
use crate::error::AuthError;
use crate::events::{EventBus, SessionEvent};
use crate::models::{Identity, LoginOutcome, UserPatch, UserRecord};
use crate::store::{SessionStore, StoreExt, keys};

/// What happened to the guest cart during login.
#[derive(Debug)]
pub enum GuestCartHandoff {
    /// No guest identity preceded this login.
    NotNeeded,
    /// The guest cart was merged into the user's cart.
    Merged,
    /// The guest cart was discarded server-side.
    Cleared,
    /// The handoff call failed; the server cart is left as-is.
    Failed(ApiError),
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginReport {
    pub user_id: UserId,
    pub guest_cart: GuestCartHandoff,
}

/// Outcome of one background verification pass.
#[derive(Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Nothing to verify; the session is a guest.
    SkippedGuest,
    /// Token and role both check out (or the check failed silently).
    Verified,
    /// The server reported a different role; local state was updated.
    RoleUpdated(RoleId),
    /// The token was rejected and the session torn down.
    SessionEnded,
}

/// Owns the active identity and its persisted form.
pub struct AuthSession<B> {
    backend: Arc<B>,
    store: Arc<dyn SessionStore>,
    bus: EventBus,
    identity: Mutex<Identity>,
    expiry_buffer: Duration,
}

impl<B: CommerceBackend> AuthSession<B> {
    pub fn new(
        backend: Arc<B>,
        store: Arc<dyn SessionStore>,
        bus: EventBus,
        expiry_buffer: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            bus,
            identity: Mutex::new(Identity::empty_guest()),
            expiry_buffer,
        }
    }

    /// Restore the identity from the persisted token and user record.
    ///
    /// A missing token, missing record, or structurally invalid record leaves
    /// the session as a guest; invalid persisted state is removed so the next
    /// restore starts clean.
    #[instrument(skip(self))]
    pub fn restore(&self) {
        let token = self.store.get(keys::TOKEN);
        let user: Option<UserRecord> = self.store.get_json(keys::USER);

        let identity = match (token, user) {
            (Some(token), Some(user)) if user.is_structurally_valid() => {
                Identity::Authenticated { user, token }
            }
            (token, user) => {
                if token.is_some() || user.is_some() {
                    warn!("discarding incomplete or invalid persisted session");
                    self.store.remove(keys::TOKEN);
                    self.store.remove(keys::USER);
                }
                Identity::Guest {
                    guest_id: self.store.get(keys::GUEST_ID).map(GuestId::new),
                }
            }
        };
        *self.identity.lock() = identity;
    }

    /// Transition to an authenticated identity.
    ///
    /// The guest cart, if any, is handed off first: merged when the
    /// just-registered marker is set, discarded otherwise. The handoff result
    /// is carried in the report; a failed handoff never fails the login.
    /// Guest-scoped keys are purged afterwards and a forced cart refresh is
    /// signalled.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] when the outcome carries no token;
    /// the session is left untouched in that case.
    #[instrument(skip(self, outcome), fields(user_id = %outcome.user.id))]
    pub async fn login(&self, outcome: LoginOutcome) -> Result<LoginReport, AuthError> {
        let Some(token) = outcome.token else {
            warn!("login result carried no token, session unchanged");
            return Err(AuthError::MissingToken);
        };
        let user = outcome.user;

        // Captured before the purge below
        let guest_id = self.store.get(keys::GUEST_ID).map(GuestId::new);
        let cached_lines: Vec<crate::models::CartLine> =
            self.store.get_json(keys::CART_ITEMS).unwrap_or_default();
        let just_registered = self
            .store
            .get(keys::JUST_REGISTERED)
            .is_some_and(|v| v == "1");

        self.store.set(keys::TOKEN, &token);
        self.store.set_json(keys::USER, &user);

        let guest_cart = match guest_id {
            None => GuestCartHandoff::NotNeeded,
            Some(guest_id) if just_registered => {
                match self
                    .backend
                    .merge_guest_cart(&token, &cached_lines, &guest_id)
                    .await
                {
                    Ok(()) => GuestCartHandoff::Merged,
                    Err(err) => {
                        warn!(error = %err, "guest cart merge failed");
                        GuestCartHandoff::Failed(err)
                    }
                }
            }
            Some(_) => match self.backend.clear_guest_cart().await {
                Ok(()) => GuestCartHandoff::Cleared,
                Err(err) => {
                    warn!(error = %err, "guest cart clear failed");
                    GuestCartHandoff::Failed(err)
                }
            },
        };

        self.store.remove_all(keys::GUEST_SCOPED);

        let user_id = user.id;
        *self.identity.lock() = Identity::Authenticated { user, token };

        self.bus.emit(SessionEvent::ForceCartRefresh);
        Ok(LoginReport {
            user_id,
            guest_cart,
        })
    }

    /// Tear down the authenticated session.
    ///
    /// The backend logout is best-effort; local state is purged regardless and
    /// a cart reset is signalled. The caller is expected to bootstrap a fresh
    /// guest session afterwards.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(err) = self.backend.logout().await {
            warn!(error = %err, "backend logout failed, clearing local session anyway");
        }
        self.store.remove_all(keys::SESSION_SCOPED);
        *self.identity.lock() = Identity::empty_guest();
        self.bus.emit(SessionEvent::ForceCartReset);
    }

    /// Merge a partial update into the authenticated user, persisting the
    /// result. The token is replaced only when the patch carries one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when no user is logged in.
    pub fn set_user_state(&self, patch: UserPatch) -> Result<(), AuthError> {
        let mut identity = self.identity.lock();
        let Identity::Authenticated { user, token } = &mut *identity else {
            return Err(AuthError::NotAuthenticated);
        };

        let new_token = patch.token.clone();
        *user = patch.apply_to(user.clone());
        if let Some(t) = new_token {
            *token = t;
        }

        self.store.set(keys::TOKEN, token);
        self.store.set_json(keys::USER, user);
        Ok(())
    }

    /// One pass of the background verification loop: token expiry first, then
    /// the server-side role.
    #[instrument(skip(self))]
    pub async fn verification_tick(&self) -> VerificationOutcome {
        let (token, cached_role) = {
            let identity = self.identity.lock();
            match &*identity {
                Identity::Authenticated { user, token } => {
                    (token.clone(), user.primary_role())
                }
                Identity::Guest { .. } => return VerificationOutcome::SkippedGuest,
            }
        };

        self.check_token_expiry(&token).await;
        self.verify_role(&token, cached_role).await
    }

    /// Trigger the refresh routine when the token is inside the expiry buffer.
    /// Undecodable tokens are left alone; the server will reject them if they
    /// are actually bad.
    async fn check_token_expiry(&self, token: &str) {
        let Some(expiry) = decode_token_expiry(token) else {
            debug!("token expiry not decodable, skipping expiry check");
            return;
        };
        let remaining = expiry - Utc::now();
        let buffer = i64::try_from(self.expiry_buffer.as_secs()).unwrap_or(i64::MAX);
        if remaining.num_seconds() < buffer {
            debug!(expiry = %expiry, "token inside expiry buffer, refreshing");
            self.refresh_token().await;
        }
    }

    // TODO: wire up once the backend exposes a refresh endpoint; until then
    // an expiring token rides until the server returns 401.
    async fn refresh_token(&self) {
        debug!("token refresh requested but no refresh endpoint is available");
    }

    /// Re-check the server-side role against the cached one. Transport
    /// failures are silent; a 401 ends the session.
    async fn verify_role(&self, token: &str, cached_role: Option<RoleId>) -> VerificationOutcome {
        match self.backend.fetch_profile(token).await {
            Ok(profile) => {
                let server_role = profile.primary_role();
                match server_role {
                    Some(role) if server_role != cached_role => {
                        let _ = self.set_user_state(UserPatch {
                            roles: Some(vec![role]),
                            ..UserPatch::default()
                        });
                        self.bus.emit(SessionEvent::RoleChanged { role });
                        VerificationOutcome::RoleUpdated(role)
                    }
                    _ => VerificationOutcome::Verified,
                }
            }
            Err(ApiError::Unauthorized) => {
                warn!("token rejected during verification, ending session");
                self.logout().await;
                VerificationOutcome::SessionEnded
            }
            Err(err) => {
                debug!(error = %err, "role verification failed, keeping session");
                VerificationOutcome::Verified
            }
        }
    }

    /// The active identity.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity.lock().clone()
    }

    /// Record the server-issued guest ID on a guest identity.
    pub(crate) fn set_guest_id(&self, guest_id: GuestId) {
        let mut identity = self.identity.lock();
        if let Identity::Guest { guest_id: slot } = &mut *identity {
            *slot = Some(guest_id);
        }
    }

    /// The request scope for the active identity.
    #[must_use]
    pub fn cart_scope(&self) -> CartScope {
        self.identity
            .lock()
            .user_id()
            .map_or_else(CartScope::guest, CartScope::user)
    }

    /// The bearer token, when authenticated.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        match &*self.identity.lock() {
            Identity::Authenticated { token, .. } => Some(token.clone()),
            Identity::Guest { .. } => None,
        }
    }
}

/// Decode the `exp` claim of a JWT without verifying the signature. The
/// client only schedules refreshes from it; the server remains the authority.
fn decode_token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}
