//! Rupiah price type with canonical display formatting.
//!
//! The commerce backend reports prices inconsistently: sometimes as a bare
//! number, sometimes as a pre-formatted `"Rp20.000"` string. [`Price`] is the
//! canonical in-memory representation (whole rupiah, no fractional unit) and
//! its `Display` impl is the single source of the display format.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A price in whole Indonesian rupiah.
///
/// Serializes transparently as an integer. Display formatting follows the
/// `id-ID` convention: `Rp` prefix, dot thousands grouping, no decimals.
///
/// # Examples
///
/// ```
/// use pasar_core::Price;
///
/// assert_eq!(Price::new(20_000).to_string(), "Rp20.000");
/// assert_eq!(Price::parse_lenient("Rp20.000"), Price::new(20_000));
/// assert_eq!(Price::parse_lenient("20000"), Price::new(20_000));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(0);

    /// Create a price from a whole-rupiah amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// The underlying rupiah amount.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Parse a price from any of the formats the backend emits.
    ///
    /// Accepts `Rp`-formatted strings (`"Rp20.000"`), bare digit strings
    /// (`"20000"`), and digit strings with grouping (`"20.000"`). Any
    /// non-digit characters are ignored. Unparseable input degrades to zero,
    /// matching how the storefront treats a missing total.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        Self(digits.parse::<i64>().unwrap_or(0))
    }

    /// Multiply by a line quantity, saturating on overflow.
    #[must_use]
    pub const fn times(&self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }

    /// Add another price, saturating on overflow.
    #[must_use]
    pub const fn plus(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-")?;
        }
        write!(f, "Rp{}", group_thousands(self.0.unsigned_abs()))
    }
}

impl From<i64> for Price {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Price> for i64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// Format an unsigned amount with `id-ID` dot grouping (`20000` -> `20.000`).
fn group_thousands(mut n: u64) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut groups = Vec::new();
    while n > 0 {
        groups.push(n % 1000);
        n /= 1000;
    }
    let mut out = String::new();
    for (i, group) in groups.iter().rev().enumerate() {
        if i == 0 {
            out.push_str(&group.to_string());
        } else {
            out.push_str(&format!(".{group:03}"));
        }
    }
    out
}
