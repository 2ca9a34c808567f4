//! Value objects
//!
//! All monetary values are integer minor units (kobo/cents); no floating
//! point anywhere in a price path.

use serde::{Deserialize, Serialize};

/// A line's price captured at the moment of addition or split.
///
/// Both fields are line totals (unit price × quantity), matching how the
/// store persists them. Once written to an order line the snapshot is
/// immune to later catalog price changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub list: i64,
    pub selling: i64,
}

impl PriceSnapshot {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Snapshot for `quantity` units at the given unit prices.
    pub fn line(unit_list: i64, unit_selling: i64, quantity: i32) -> Self {
        debug_assert!(unit_selling <= unit_list, "selling price above list price");
        Self {
            list: unit_list * i64::from(quantity),
            selling: unit_selling * i64::from(quantity),
        }
    }

    /// Re-derive the unit prices from the stored ratio.
    ///
    /// `quantity` must be the quantity this snapshot was computed for;
    /// the division is exact by construction.
    pub fn unit_prices(&self, quantity: i32) -> (i64, i64) {
        let qty = i64::from(quantity.max(1));
        (self.list / qty, self.selling / qty)
    }

    /// Rescale to a new quantity, keeping the unit ratio.
    pub fn rescaled(&self, old_quantity: i32, new_quantity: i32) -> Self {
        let (unit_list, unit_selling) = self.unit_prices(old_quantity);
        Self::line(unit_list, unit_selling, new_quantity)
    }

    pub fn add(&self, other: &PriceSnapshot) -> Self {
        Self { list: self.list + other.list, selling: self.selling + other.selling }
    }
}

/// Aggregate figures recomputed from a cart's lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsSnapshot {
    pub quantity: i32,
    pub list_total: i64,
    pub selling_total: i64,
    pub discount_pct: i64,
}

impl TotalsSnapshot {
    pub fn compute(quantity: i32, list_total: i64, selling_total: i64) -> Self {
        Self {
            quantity,
            list_total,
            selling_total,
            discount_pct: discount_percentage(list_total, selling_total),
        }
    }
}

/// `floor(100 × (list − selling) / list)` when `list > 0`, else 0.
pub fn discount_percentage(list_total: i64, selling_total: i64) -> i64 {
    if list_total <= 0 || selling_total < 0 {
        return 0;
    }
    (list_total - selling_total) * 100 / list_total
}
