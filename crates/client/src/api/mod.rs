//! Commerce backend API contract and HTTP client.
//!
//! # Architecture
//!
//! The backend is an external service reached only through its network
//! contract. [`CommerceBackend`] captures that contract as a trait so the
//! synchronization logic can be exercised against a recording mock in tests;
//! [`HttpBackend`] is the `reqwest` implementation used in production.
//!
//! Cart reads are scoped by an optional user ID query parameter. When it is
//! absent the server resolves the guest scope from its own session cookie,
//! which is why the HTTP client keeps a cookie store enabled.

mod http;
pub mod types;

pub use http::HttpBackend;

use std::future::Future;

use thiserror::Error;

use pasar_core::{CartEntryId, CatalogId, GuestId, Price, SizeId, UserId};

use crate::models::CartLine;
use types::{CartItemWire, ProfileResponse};

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response, with the payload message when one was present.
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("(no message)"))]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// The token was rejected (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// The backend returned `success: false` with an optional business
    /// message. Never retried automatically.
    #[error("rejected: {}", message.as_deref().unwrap_or("(no message)"))]
    Business { message: Option<String> },

    /// Response body could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field the contract requires was absent.
    #[error("missing field in response: {0}")]
    MissingField(&'static str),
}

/// Identity scoping for cart requests.
///
/// `user_id` is sent as a query parameter / body field when authenticated;
/// when absent the server derives the guest scope from its session cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartScope {
    pub user_id: Option<UserId>,
}

impl CartScope {
    /// Scope for an authenticated user.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Guest scope (server-resolved).
    #[must_use]
    pub const fn guest() -> Self {
        Self { user_id: None }
    }
}

/// The commerce backend's network contract.
///
/// All futures are `Send` so callers can drive them from spawned tasks.
pub trait CommerceBackend: Send + Sync + 'static {
    /// Request a new guest identifier.
    fn guest_session(&self) -> impl Future<Output = Result<GuestId, ApiError>> + Send;

    /// Read the cart lines for the given scope. `force` bypasses any caches.
    fn cart_items(
        &self,
        scope: CartScope,
        force: bool,
    ) -> impl Future<Output = Result<Vec<CartItemWire>, ApiError>> + Send;

    /// Read the cart item count for the given scope.
    fn cart_count(
        &self,
        scope: CartScope,
        force: bool,
    ) -> impl Future<Output = Result<u32, ApiError>> + Send;

    /// Read the cart total for the given scope.
    fn cart_total(
        &self,
        scope: CartScope,
        force: bool,
    ) -> impl Future<Output = Result<Price, ApiError>> + Send;

    /// Add an item to the cart.
    fn add_to_cart(
        &self,
        scope: CartScope,
        catalog: CatalogId,
        size: SizeId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Update a cart entry's quantity.
    fn update_cart_entry(
        &self,
        scope: CartScope,
        entry: CartEntryId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove a cart entry.
    fn remove_cart_entry(
        &self,
        scope: CartScope,
        entry: CartEntryId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Merge a guest cart into the authenticated user's cart.
    fn merge_guest_cart(
        &self,
        token: &str,
        lines: &[CartLine],
        guest_id: &GuestId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Clear the current guest's cart server-side without merging.
    fn clear_guest_cart(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Terminate the backend session.
    fn logout(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Fetch the authenticated profile for role verification.
    fn fetch_profile(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ProfileResponse, ApiError>> + Send;
}
