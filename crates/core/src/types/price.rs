//! Type-safe price representation using decimal arithmetic.
//!
//! The marketplace trades in Bangladeshi taka only, so prices carry no
//! currency code.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount in Bangladeshi taka (BDT).
///
/// Serialized as a decimal string (e.g. `"1250.50"`) to avoid float drift.
///
/// ```
/// use rust_decimal::Decimal;
/// use taja_haat_core::Taka;
///
/// let per_kg = Taka::new(Decimal::new(4550, 2)); // 45.50
/// assert_eq!(per_kg.times(10).to_string(), "৳455.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Taka(Decimal);

impl Taka {
    /// Currency symbol used for display.
    pub const SYMBOL: &'static str = "৳";

    /// Zero taka.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from whole taka.
    #[must_use]
    pub fn whole(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Taka {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", Self::SYMBOL, self.0)
    }
}

impl std::str::FromStr for Taka {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(Self::SYMBOL);
        Decimal::from_str_exact(trimmed).map(Self)
    }
}

impl From<Decimal> for Taka {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}
