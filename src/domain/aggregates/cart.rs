//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{PriceSnapshot, TotalsSnapshot};

/// Exactly one owner per cart: a registered user or an anonymous temp key.
/// The tag only changes through [`Cart::reassign_to`] during a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    User(Uuid),
    Anonymous(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    pub fn temp_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Anonymous(id) => Some(id.as_str()),
        }
    }

    /// Key used for the single-writer advisory lock on this owner's cart.
    pub fn lock_key(&self) -> String {
        match self {
            Self::User(id) => format!("cart:user:{id}"),
            Self::Anonymous(id) => format!("cart:temp:{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    /// Denormalized owner for audit; null until the cart belongs to a user.
    pub user_id: Option<Uuid>,
    pub size: Option<String>,
    pub quantity: i32,
    pub price: PriceSnapshot,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub owner: CartOwner,
    pub coupon_code: Option<String>,
    pub lines: Vec<CartLine>,
    pub totals: TotalsSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            coupon_code: None,
            lines: vec![],
            totals: TotalsSnapshot::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_for_product(&self, product_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Add `quantity` of a product, accumulating onto an existing line for
    /// the same product. The line snapshot is recomputed as
    /// `new_quantity × unit price`.
    pub fn upsert_line(
        &mut self,
        product_id: Uuid,
        quantity: i32,
        unit_list: i64,
        unit_selling: i64,
        size: Option<String>,
    ) -> &CartLine {
        let user_id = self.owner.user_id();
        let idx = match self.lines.iter().position(|l| l.product_id == product_id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity += quantity;
                line.price = PriceSnapshot::line(unit_list, unit_selling, line.quantity);
                idx
            }
            None => {
                self.lines.push(CartLine {
                    id: Uuid::new_v4(),
                    cart_id: self.id,
                    product_id,
                    user_id,
                    size,
                    quantity,
                    price: PriceSnapshot::line(unit_list, unit_selling, quantity),
                });
                self.lines.len() - 1
            }
        };
        self.recalculate();
        &self.lines[idx]
    }

    /// Recompute aggregate quantity, list total, selling total and discount
    /// percentage from the lines.
    pub fn recalculate(&mut self) {
        let mut quantity = 0i32;
        let mut sum = PriceSnapshot::zero();
        for line in &self.lines {
            quantity += line.quantity;
            sum = sum.add(&line.price);
        }
        self.totals = TotalsSnapshot::compute(quantity, sum.list, sum.selling);
        self.updated_at = Utc::now();
    }

    /// Atomically swap the anonymous tag for a user tag, stamping every
    /// line's denormalized owner. Used when a guest cart is adopted whole.
    pub fn reassign_to(&mut self, user_id: Uuid) {
        self.owner = CartOwner::User(user_id);
        for line in &mut self.lines {
            line.user_id = Some(user_id);
        }
        self.updated_at = Utc::now();
    }

    /// Fold a merge plan into this (user) cart. Persistence executes the
    /// same plan row by row; this keeps the in-memory aggregate consistent.
    pub fn apply_merge(&mut self, plan: &MergePlan) {
        for updated in &plan.updated {
            if let Some(line) = self.lines.iter_mut().find(|l| l.id == updated.id) {
                *line = updated.clone();
            }
        }
        for adopted in &plan.adopted {
            self.lines.push(adopted.clone());
        }
        self.recalculate();
    }
}

/// The line-level outcome of merging an anonymous cart into a user's cart.
///
/// Built purely from the two carts; the cart service executes it inside a
/// single transaction. Every temp-cart line ends up in exactly one of
/// `updated` (combined into an existing user line, temp line consumed) or
/// `adopted` (re-parented onto the user cart).
#[derive(Clone, Debug, Default)]
pub struct MergePlan {
    /// User-cart lines with summed quantity and a rescaled snapshot.
    pub updated: Vec<CartLine>,
    /// Temp-cart lines re-parented onto the user cart (ownership transfer).
    pub adopted: Vec<CartLine>,
    /// Temp-line ids consumed by an `updated` entry.
    pub consumed: Vec<Uuid>,
}

impl MergePlan {
    pub fn build(user_cart: &Cart, temp_cart: &Cart, user_id: Uuid) -> Self {
        let mut plan = Self::default();
        for temp_line in &temp_cart.lines {
            match user_cart.line_for_product(temp_line.product_id) {
                Some(existing) => {
                    let summed = existing.quantity + temp_line.quantity;
                    let mut updated = existing.clone();
                    // Unit price comes from the surviving line's snapshot
                    // ratio, not a fresh catalog lookup.
                    updated.price = existing.price.rescaled(existing.quantity, summed);
                    updated.quantity = summed;
                    updated.user_id = Some(user_id);
                    plan.updated.push(updated);
                    plan.consumed.push(temp_line.id);
                }
                None => {
                    let mut adopted = temp_line.clone();
                    adopted.cart_id = user_cart.id;
                    adopted.user_id = Some(user_id);
                    plan.adopted.push(adopted);
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.adopted.is_empty()
    }
}
