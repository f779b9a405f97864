//! Price bounds using decimal arithmetic.
//!
//! Catalog pages carry an optional `{min, max}` range of the displayed
//! prices. When pages are appended the accumulated range only ever widens.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inclusive price bounds of a set of products, in major currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lowest price.
    pub min: Decimal,
    /// Highest price.
    pub max: Decimal,
}

impl PriceRange {
    /// Create a new price range.
    #[must_use]
    pub const fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    /// Merge two ranges, keeping the lower minimum and the higher maximum.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Smallest range covering every price, or `None` for an empty input.
    pub fn covering(prices: impl IntoIterator<Item = Decimal>) -> Option<Self> {
        prices.into_iter().fold(None, |acc, price| {
            Some(match acc {
                None => Self::new(price, price),
                Some(range) => range.merge(Self::new(price, price)),
            })
        })
    }
}

/// Merge optional ranges: absent sides are ignored, both absent stays absent.
#[must_use]
pub fn merge_price_ranges(
    previous: Option<PriceRange>,
    next: Option<PriceRange>,
) -> Option<PriceRange> {
    match (previous, next) {
        (None, None) => None,
        (Some(range), None) | (None, Some(range)) => Some(range),
        (Some(previous), Some(next)) => Some(previous.merge(next)),
    }
}
