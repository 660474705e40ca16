//! Cart snapshot types.
//!
//! The snapshot is always replaced wholesale on fetch, never patched line by
//! line. Aggregates are cached alongside the lines; an empty line sequence
//! forces both aggregates to zero regardless of what the backend reported.

use serde::{Deserialize, Serialize};

use pasar_core::{CartEntryId, CatalogId, GuestId, Price, SizeId, UserId};

/// Reference to the catalog product a cart line points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRef {
    pub id: CatalogId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Reference to the product size/variant a cart line points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeRef {
    pub id: SizeId,
    /// Size label, e.g. "M" or "Large".
    pub label: String,
    /// Unit price, normalized to the canonical representation.
    pub unit_price: Price,
    /// Available stock, when the backend reports it. This is the product
    /// stock, not the cart quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartEntryId,
    /// Owner when the line belongs to an authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Owner when the line belongs to a guest session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<GuestId>,
    /// Quantity in the cart; at least 1.
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeRef>,
}

impl CartLine {
    /// The line's unit price, zero when the size reference is missing.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.size.as_ref().map_or(Price::ZERO, |s| s.unit_price)
    }
}

/// The complete current state of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    /// Total item count as reported by the backend.
    pub count: u32,
    /// Cart total as reported by the backend.
    pub total: Price,
}

impl CartSnapshot {
    /// An empty snapshot with zero aggregates.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from fetched parts, enforcing the aggregate
    /// invariant: an empty line sequence forces both aggregates to zero,
    /// even when the backend reported stale nonzero values.
    #[must_use]
    pub fn from_parts(lines: Vec<CartLine>, count: u32, total: Price) -> Self {
        if lines.is_empty() {
            return Self::empty();
        }
        Self {
            lines,
            count,
            total,
        }
    }

    /// Recompute aggregates from the lines themselves. Used as a consistency
    /// check in tests; the backend's reported aggregates are authoritative at
    /// runtime.
    #[must_use]
    pub fn derived_aggregates(&self) -> (u32, Price) {
        let count = self.lines.iter().map(|l| l.quantity).sum();
        let total = self
            .lines
            .iter()
            .fold(Price::ZERO, |acc, l| acc.plus(l.unit_price().times(l.quantity)));
        (count, total)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: u32, price: i64) -> CartLine {
        CartLine {
            id: CartEntryId::new(id),
            user_id: None,
            guest_id: Some(GuestId::from("g-1")),
            quantity,
            catalog: Some(CatalogRef {
                id: CatalogId::new(10),
                name: "Batik Shirt".to_string(),
                image: None,
            }),
            size: Some(SizeRef {
                id: SizeId::new(3),
                label: "M".to_string(),
                unit_price: Price::new(price),
                stock: Some(5),
            }),
        }
    }

    #[test]
    fn test_empty_lines_force_zero_aggregates() {
        // Stale nonzero aggregates must not survive an empty line list
        let snapshot = CartSnapshot::from_parts(vec![], 4, Price::new(80_000));
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.total, Price::ZERO);
    }

    #[test]
    fn test_nonempty_keeps_reported_aggregates() {
        let snapshot = CartSnapshot::from_parts(vec![line(1, 2, 10_000)], 2, Price::new(20_000));
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.total, Price::new(20_000));
    }

    #[test]
    fn test_derived_aggregates() {
        let snapshot = CartSnapshot::from_parts(
            vec![line(1, 2, 10_000), line(2, 1, 5_000)],
            3,
            Price::new(25_000),
        );
        let (count, total) = snapshot.derived_aggregates();
        assert_eq!(count, 3);
        assert_eq!(total, Price::new(25_000));
    }
}
