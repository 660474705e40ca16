//! Local session store.
//!
//! Persisted key/value state mirroring what the storefront keeps in browser
//! local storage: token, user record, guest identifier, cached cart snapshot,
//! last-fetch timestamp, and the one-shot just-registered marker.
//!
//! The store is not authoritative for cart state; the cached snapshot exists
//! only as a fallback when the backend is unreachable and is overwritten on
//! every successful fetch. Corrupt entries are discarded on read and the
//! session degrades to unauthenticated/guest.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use pasar_core::Price;

use crate::models::{CartLine, CartSnapshot};

/// Persisted key names.
pub mod keys {
    /// Bearer token for the authenticated session.
    pub const TOKEN: &str = "token";
    /// Serialized [`UserRecord`](crate::models::UserRecord).
    pub const USER: &str = "user";
    /// Server-issued guest identifier.
    pub const GUEST_ID: &str = "guest_id";
    /// Serialized cached cart lines.
    pub const CART_ITEMS: &str = "cart_items";
    /// Cached cart count.
    pub const CART_COUNT: &str = "cart_count";
    /// Cached cart total (rupiah amount).
    pub const CART_TOTAL: &str = "cart_total";
    /// Millisecond timestamp of the last successful throttled fetch.
    pub const CART_LAST_FETCH: &str = "cart_last_fetch_time";
    /// One-shot marker set at registration, consumed at next login.
    pub const JUST_REGISTERED: &str = "just_registered";
    /// Leftover guest invoice reference; purged on identity transitions.
    pub const GUEST_INVOICE_ID: &str = "guest_invoice_id";
    /// Leftover invoice payload; purged on identity transitions.
    pub const INVOICE_DATA: &str = "invoice_data";

    /// Keys purged when a guest identity is replaced by login.
    pub const GUEST_SCOPED: &[&str] = &[
        GUEST_ID,
        GUEST_INVOICE_ID,
        INVOICE_DATA,
        CART_ITEMS,
        CART_COUNT,
        CART_TOTAL,
        CART_LAST_FETCH,
        JUST_REGISTERED,
    ];

    /// Keys purged on logout.
    pub const SESSION_SCOPED: &[&str] = &[
        TOKEN,
        USER,
        GUEST_ID,
        GUEST_INVOICE_ID,
        INVOICE_DATA,
        CART_ITEMS,
        CART_COUNT,
        CART_TOTAL,
        CART_LAST_FETCH,
    ];
}

/// A persisted key/value store for session state.
///
/// Implementations are infallible from the caller's perspective: persistence
/// failures are logged and swallowed, matching how the storefront treats
/// local storage errors. Values are plain strings; use [`StoreExt`] for
/// JSON-serialized values.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// JSON helpers over any [`SessionStore`].
pub trait StoreExt: SessionStore {
    /// Read and deserialize a JSON value. A corrupt entry is removed and
    /// treated as absent.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding corrupt store entry");
                self.remove(key);
                None
            }
        }
    }

    /// Serialize and persist a JSON value.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(err) => warn!(key, error = %err, "failed to serialize store entry"),
        }
    }

    /// Remove every key in `keys`.
    fn remove_all(&self, keys: &[&str]) {
        for key in keys {
            self.remove(key);
        }
    }
}

impl<S: SessionStore + ?Sized> StoreExt for S {}

// =============================================================================
// Cached cart snapshot
// =============================================================================

/// Read the cached cart snapshot, if all three parts are present and
/// structurally valid.
///
/// The aggregate invariant is re-enforced on read: an empty cached line list
/// yields zero aggregates even if stale nonzero values were persisted.
pub fn read_cached_cart(store: &dyn SessionStore) -> Option<CartSnapshot> {
    let lines: Vec<CartLine> = store.get_json(keys::CART_ITEMS)?;
    let count = store.get(keys::CART_COUNT)?.parse::<u32>().ok()?;
    let total = store.get(keys::CART_TOTAL)?.parse::<i64>().ok()?;
    Some(CartSnapshot::from_parts(lines, count, Price::new(total)))
}

/// Overwrite the cached cart snapshot.
pub fn write_cached_cart(store: &dyn SessionStore, snapshot: &CartSnapshot) {
    store.set_json(keys::CART_ITEMS, &snapshot.lines);
    store.set(keys::CART_COUNT, &snapshot.count.to_string());
    store.set(keys::CART_TOTAL, &snapshot.total.amount().to_string());
}

/// Reset the cached cart snapshot to empty.
pub fn clear_cached_cart(store: &dyn SessionStore) {
    write_cached_cart(store, &CartSnapshot::empty());
}

/// Millisecond timestamp of the last throttled fetch, when recorded.
pub fn read_last_fetch_ms(store: &dyn SessionStore) -> Option<i64> {
    store.get(keys::CART_LAST_FETCH)?.parse::<i64>().ok()
}

/// Record the throttle timestamp.
pub fn write_last_fetch_ms(store: &dyn SessionStore, now_ms: i64) {
    store.set(keys::CART_LAST_FETCH, &now_ms.to_string());
}
