//! User-facing error types for cart and auth operations.
//!
//! The backend reports business-rule rejections (insufficient stock, merge
//! conflicts) as messages meant for the shopper. This module owns the
//! distinction between those rejections and plain transport failures, and the
//! reformatting of the backend's English stock message into the localized
//! storefront wording.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::api::ApiError;

/// Localized user-facing messages surfaced by the cart synchronizer.
pub mod messages {
    /// Generic failure when adding an item.
    pub const ADD_FAILED: &str = "Gagal menambahkan item ke keranjang.";
    /// Generic failure when updating a line quantity.
    pub const UPDATE_FAILED: &str = "Gagal memperbarui keranjang.";
    /// Generic failure when removing a line.
    pub const REMOVE_FAILED: &str = "Gagal menghapus item dari keranjang.";
    /// Rejection for a quantity below one.
    pub const QUANTITY_TOO_LOW: &str = "Jumlah minimal 1.";
}

/// A failed cart operation, carrying the message to show the shopper.
///
/// `Rejected` is a business-rule rejection from the backend and is never
/// retried automatically. `Failed` is a transport-level failure degraded to a
/// generic localized message.
#[derive(Debug, Error)]
pub enum CartError {
    /// The backend rejected the operation; the message is user-ready.
    #[error("{0}")]
    Rejected(String),
    /// The request could not be completed; generic localized message.
    #[error("{0}")]
    Failed(&'static str),
}

impl CartError {
    /// The message to surface to the user.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected(msg) => msg,
            Self::Failed(msg) => msg,
        }
    }
}

/// Errors from the auth session manager.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login result carried no token; login is a logged no-op.
    #[error("login result carried no token")]
    MissingToken,
    /// An operation that requires an authenticated identity ran without one.
    #[error("not authenticated")]
    NotAuthenticated,
    /// Backend call failed.
    #[error("backend error: {0}")]
    Api(#[from] ApiError),
}

// Matches the backend's stock rejection, e.g.
// "Insufficient stock for Widget (Large). Available: 3"
static INSUFFICIENT_STOCK: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r"Insufficient stock for (.*?) \((.*?)\)\. Available: (\d+)").unwrap()
});

/// Reformat the backend's insufficient-stock message into the localized,
/// line-specific wording. Returns the input unchanged when it does not match
/// the known shape.
#[must_use]
pub fn localize_stock_message(message: &str) -> String {
    INSUFFICIENT_STOCK.captures(message).map_or_else(
        || message.to_owned(),
        |caps| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let size = caps.get(2).map_or("", |m| m.as_str());
            let available = caps.get(3).map_or("", |m| m.as_str());
            format!("Stok {name} ({size}) tidak cukup. Tersedia: {available}")
        },
    )
}

/// Extract the most specific user-facing message from a failed mutation,
/// applying the stock-message localization.
///
/// Preference order: server payload message, then the given generic message.
#[must_use]
pub fn mutation_failure(err: &ApiError, generic: &'static str) -> CartError {
    match err {
        ApiError::Business {
            message: Some(msg),
        }
        | ApiError::Status {
            message: Some(msg), ..
        } => CartError::Rejected(localize_stock_message(msg)),
        ApiError::Business { message: None } => CartError::Rejected(generic.to_owned()),
        _ => CartError::Failed(generic),
    }
}

/// [`mutation_failure`] specialized to quantity updates.
#[must_use]
pub fn update_failure(err: &ApiError) -> CartError {
    mutation_failure(err, messages::UPDATE_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_stock_message_match() {
        let msg = "Insufficient stock for Widget (Large). Available: 3";
        assert_eq!(
            localize_stock_message(msg),
            "Stok Widget (Large) tidak cukup. Tersedia: 3"
        );
    }

    #[test]
    fn test_localize_stock_message_passthrough() {
        let msg = "Cart entry not found";
        assert_eq!(localize_stock_message(msg), msg);
    }

    #[test]
    fn test_localize_stock_message_multiword_product() {
        let msg = "Insufficient stock for Batik Shirt Premium (XL). Available: 12";
        assert_eq!(
            localize_stock_message(msg),
            "Stok Batik Shirt Premium (XL) tidak cukup. Tersedia: 12"
        );
    }

    #[test]
    fn test_update_failure_prefers_business_message() {
        let err = ApiError::Business {
            message: Some("Insufficient stock for Widget (Large). Available: 3".into()),
        };
        let cart_err = update_failure(&err);
        assert_eq!(
            cart_err.user_message(),
            "Stok Widget (Large) tidak cukup. Tersedia: 3"
        );
    }

    #[test]
    fn test_update_failure_uses_status_payload_message() {
        let err = ApiError::Status {
            status: 400,
            message: Some("Cart entry not found".into()),
        };
        assert_eq!(update_failure(&err).user_message(), "Cart entry not found");
    }

    #[test]
    fn test_update_failure_generic_on_transport() {
        let err = ApiError::Status {
            status: 502,
            message: None,
        };
        assert_eq!(
            update_failure(&err).user_message(),
            messages::UPDATE_FAILED
        );
    }
}
