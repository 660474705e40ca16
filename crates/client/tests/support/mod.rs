//! Shared test harness: an in-memory recording backend and pre-wired
//! component stacks.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use pasar_client::api::types::{
    CartItemWire, CatalogWire, PriceWire, ProfileResponse, ProfileRole, SizeWire,
};
use pasar_client::api::{ApiError, CartScope, CommerceBackend};
use pasar_client::auth::AuthSession;
use pasar_client::cart::CartSync;
use pasar_client::events::EventBus;
use pasar_client::models::{CartLine, LoginOutcome, UserRecord};
use pasar_client::store::{MemoryStore, SessionStore};
use pasar_core::{CartEntryId, CatalogId, Email, GuestId, Price, RoleId, SizeId, UserId};

/// One line held server-side by the mock.
#[derive(Debug, Clone)]
pub struct MockLine {
    pub id: i32,
    pub quantity: u32,
    pub name: String,
    pub size: String,
    pub unit_price: i64,
}

#[derive(Debug, Default)]
struct BackendState {
    guest_lines: Vec<MockLine>,
    user_lines: Vec<MockLine>,
    next_entry: i32,
    guest_seq: u32,
    profile_role: Option<RoleId>,
    update_rejection: Option<String>,
    merge_payload: Option<(Vec<CartLine>, GuestId)>,
}

/// In-memory backend that records every call it receives.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<BackendState>,
    calls: Mutex<Vec<&'static str>>,
    fail_reads: AtomicBool,
    unauthorized_profile: AtomicBool,
    /// Delays popped one per `cart_items` call, stalling that whole read.
    read_delays: Mutex<VecDeque<Duration>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_guest_line(&self, name: &str, size: &str, unit_price: i64, quantity: u32) {
        let mut state = self.state.lock();
        state.next_entry += 1;
        let id = state.next_entry;
        state.guest_lines.push(MockLine {
            id,
            quantity,
            name: name.to_owned(),
            size: size.to_owned(),
            unit_price,
        });
    }

    pub fn set_profile_role(&self, role: RoleId) {
        self.state.lock().profile_role = Some(role);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_unauthorized_profile(&self) {
        self.unauthorized_profile.store(true, Ordering::SeqCst);
    }

    pub fn set_update_rejection(&self, message: &str) {
        self.state.lock().update_rejection = Some(message.to_owned());
    }

    /// Stall the next cart read by `delay` (applied once).
    pub fn delay_next_read(&self, delay: Duration) {
        self.read_delays.lock().push_back(delay);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Number of completed `cart_items` reads, one per reconciliation round.
    pub fn read_rounds(&self) -> usize {
        self.calls.lock().iter().filter(|c| **c == "items").count()
    }

    pub fn user_line_count(&self) -> usize {
        self.state.lock().user_lines.len()
    }

    /// The lines and guest ID carried by the last merge request, if any.
    pub fn merge_payload(&self) -> Option<(Vec<CartLine>, GuestId)> {
        self.state.lock().merge_payload.clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    fn check_reads(&self) -> Result<(), ApiError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                message: None,
            });
        }
        Ok(())
    }

    fn lines_for(&self, scope: CartScope) -> Vec<MockLine> {
        let state = self.state.lock();
        if scope.user_id.is_some() {
            state.user_lines.clone()
        } else {
            state.guest_lines.clone()
        }
    }

    fn to_wire(line: &MockLine, scope: CartScope) -> CartItemWire {
        CartItemWire {
            id: line.id,
            user_id: scope.user_id.map(|id| id.as_i32()),
            guest_id: scope.user_id.is_none().then(|| "guest-1".to_owned()),
            quantity: line.quantity,
            catalog: Some(CatalogWire {
                id: line.id,
                name: line.name.clone(),
                image: None,
            }),
            size: Some(SizeWire {
                id: line.id,
                size: line.size.clone(),
                price: PriceWire::Number(line.unit_price),
                qty: Some(99),
            }),
        }
    }
}

impl CommerceBackend for MockBackend {
    async fn guest_session(&self) -> Result<GuestId, ApiError> {
        self.record("guest_session");
        let mut state = self.state.lock();
        state.guest_seq += 1;
        Ok(GuestId::new(format!("guest-{}", state.guest_seq)))
    }

    async fn cart_items(
        &self,
        scope: CartScope,
        _force: bool,
    ) -> Result<Vec<CartItemWire>, ApiError> {
        let delay = self.read_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record("items");
        self.check_reads()?;
        Ok(self
            .lines_for(scope)
            .iter()
            .map(|l| Self::to_wire(l, scope))
            .collect())
    }

    async fn cart_count(&self, scope: CartScope, _force: bool) -> Result<u32, ApiError> {
        self.record("count");
        self.check_reads()?;
        Ok(self.lines_for(scope).iter().map(|l| l.quantity).sum())
    }

    async fn cart_total(&self, scope: CartScope, _force: bool) -> Result<Price, ApiError> {
        self.record("total");
        self.check_reads()?;
        let total = self
            .lines_for(scope)
            .iter()
            .map(|l| l.unit_price * i64::from(l.quantity))
            .sum();
        Ok(Price::new(total))
    }

    async fn add_to_cart(
        &self,
        scope: CartScope,
        catalog: CatalogId,
        _size: SizeId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        self.record("add");
        let mut state = self.state.lock();
        state.next_entry += 1;
        let id = state.next_entry;
        let line = MockLine {
            id,
            quantity,
            name: format!("Item {catalog}"),
            size: "M".to_owned(),
            unit_price: 10_000,
        };
        if scope.user_id.is_some() {
            state.user_lines.push(line);
        } else {
            state.guest_lines.push(line);
        }
        Ok(())
    }

    async fn update_cart_entry(
        &self,
        scope: CartScope,
        entry: CartEntryId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        self.record("update");
        let mut state = self.state.lock();
        if let Some(message) = state.update_rejection.clone() {
            return Err(ApiError::Business {
                message: Some(message),
            });
        }
        let lines = if scope.user_id.is_some() {
            &mut state.user_lines
        } else {
            &mut state.guest_lines
        };
        for line in lines.iter_mut() {
            if line.id == entry.as_i32() {
                line.quantity = quantity;
            }
        }
        Ok(())
    }

    async fn remove_cart_entry(
        &self,
        scope: CartScope,
        entry: CartEntryId,
    ) -> Result<(), ApiError> {
        self.record("remove");
        let mut state = self.state.lock();
        let lines = if scope.user_id.is_some() {
            &mut state.user_lines
        } else {
            &mut state.guest_lines
        };
        lines.retain(|l| l.id != entry.as_i32());
        Ok(())
    }

    async fn merge_guest_cart(
        &self,
        _token: &str,
        lines: &[CartLine],
        guest_id: &GuestId,
    ) -> Result<(), ApiError> {
        self.record("merge");
        let mut state = self.state.lock();
        state.merge_payload = Some((lines.to_vec(), guest_id.clone()));
        let merged = std::mem::take(&mut state.guest_lines);
        state.user_lines.extend(merged);
        Ok(())
    }

    async fn clear_guest_cart(&self) -> Result<(), ApiError> {
        self.record("clear_guest");
        self.state.lock().guest_lines.clear();
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.record("logout");
        Ok(())
    }

    async fn fetch_profile(&self, _token: &str) -> Result<ProfileResponse, ApiError> {
        self.record("profile");
        if self.unauthorized_profile.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized);
        }
        let role = self.state.lock().profile_role;
        Ok(ProfileResponse {
            user_roles: role.map(|role_id| ProfileRole { role_id }).into_iter().collect(),
        })
    }
}

/// A pre-wired auth + cart stack over a [`MemoryStore`].
pub struct Harness {
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemoryStore>,
    pub bus: EventBus,
    pub auth: Arc<AuthSession<MockBackend>>,
    pub cart: CartSync<MockBackend>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_throttle(Duration::from_millis(1000))
    }

    pub fn with_throttle(throttle: Duration) -> Self {
        let backend = MockBackend::new();
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn SessionStore> = store.clone();
        let bus = EventBus::new();
        let auth = Arc::new(AuthSession::new(
            Arc::clone(&backend),
            Arc::clone(&store_dyn),
            bus.clone(),
            Duration::from_secs(15 * 60),
        ));
        let cart = CartSync::new(
            Arc::clone(&backend),
            store_dyn,
            Arc::clone(&auth),
            throttle,
        );
        Self {
            backend,
            store,
            bus,
            auth,
            cart,
        }
    }
}

pub fn sample_user(id: i32) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        email: Email::parse("budi@example.com").unwrap(),
        full_name: "Budi Santoso".to_owned(),
        phone_number: None,
        photo_profile: None,
        roles: vec![RoleId::new(2)],
    }
}

pub fn login_outcome(id: i32, token: Option<&str>) -> LoginOutcome {
    LoginOutcome {
        user: sample_user(id),
        token: token.map(str::to_owned),
    }
}
