//! Wire types for the commerce backend's JSON contract.
//!
//! The backend is loosely typed: prices arrive as numbers or `Rp`-formatted
//! strings, counts may be absent, and line references (catalog, size) may be
//! null. These types absorb that looseness at the boundary so the rest of the
//! crate works with the normalized models.

use serde::{Deserialize, Serialize};

use pasar_core::{CartEntryId, CatalogId, GuestId, Price, RoleId, SizeId, UserId};

use crate::models::{CartLine, CatalogRef, SizeRef};

/// Response from the guest session issuance endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSessionResponse {
    pub guest_id: Option<String>,
}

/// Response from the cart count endpoint. A missing count means zero.
#[derive(Debug, Deserialize)]
pub struct CountResponse {
    #[serde(default)]
    pub count: u32,
}

/// Envelope returned by every cart mutation endpoint.
#[derive(Debug, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A price as the backend sends it: bare number or formatted string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceWire {
    Number(i64),
    Text(String),
}

impl PriceWire {
    /// Normalize to the canonical [`Price`].
    #[must_use]
    pub fn into_price(self) -> Price {
        match self {
            Self::Number(amount) => Price::new(amount),
            Self::Text(raw) => Price::parse_lenient(&raw),
        }
    }
}

/// Parse the `/cart/total` response body, which is a bare value.
#[must_use]
pub fn parse_total(value: &serde_json::Value) -> Price {
    match value {
        serde_json::Value::Number(n) => Price::new(n.as_i64().unwrap_or(0)),
        serde_json::Value::String(s) => Price::parse_lenient(s),
        _ => Price::ZERO,
    }
}

/// A catalog reference on a cart line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogWire {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// A size reference on a cart line. `qty` is the product stock, not the cart
/// quantity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeWire {
    pub id: i32,
    pub size: String,
    pub price: PriceWire,
    #[serde(default)]
    pub qty: Option<u32>,
}

/// A cart line as returned by `/cart/findMany`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemWire {
    pub id: i32,
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub guest_id: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub catalog: Option<CatalogWire>,
    #[serde(default)]
    pub size: Option<SizeWire>,
}

impl CartItemWire {
    /// Convert to the normalized model, canonicalizing the price.
    #[must_use]
    pub fn into_line(self) -> CartLine {
        CartLine {
            id: CartEntryId::new(self.id),
            user_id: self.user_id.map(UserId::new),
            guest_id: self.guest_id.map(GuestId::new),
            quantity: self.quantity,
            catalog: self.catalog.map(|c| CatalogRef {
                id: CatalogId::new(c.id),
                name: c.name,
                image: c.image,
            }),
            size: self.size.map(|s| SizeRef {
                id: SizeId::new(s.id),
                label: s.size,
                unit_price: s.price.into_price(),
                stock: s.qty,
            }),
        }
    }
}

/// Request body for `/cart/add`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub catalog_id: CatalogId,
    pub size_id: SizeId,
    pub quantity: u32,
}

/// Request body for `PUT /cart/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Request body for `/cart/sync` (guest-to-user merge).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest<'a> {
    pub cart: &'a [CartLine],
    pub guest_id: &'a GuestId,
    pub confirm_merge: bool,
}

/// A role entry in the profile response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRole {
    pub role_id: RoleId,
}

/// Response from `/auth/profile`, used for role re-verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(default)]
    pub user_roles: Vec<ProfileRole>,
}

impl ProfileResponse {
    /// The server-reported primary role, when any.
    #[must_use]
    pub fn primary_role(&self) -> Option<RoleId> {
        self.user_roles.first().map(|r| r.role_id)
    }
}
