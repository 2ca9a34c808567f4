//! Order Aggregate

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::cart::CartLine;
use crate::domain::payment::PaymentDetails;
use crate::domain::value_objects::PriceSnapshot;
use crate::error::Error;

/// Delivery is promised one week out from order creation.
const DELIVERY_LEAD_DAYS: i64 = 7;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Server-driven lifecycle: PENDING → CONFIRMED → SHIPPED → DELIVERED,
    /// with PENDING → CANCELLED as the only other legal edge.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered) | (Pending, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "SHIPPED" => Some(Self::Shipped),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which order states the owning user may cancel from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancellationPolicy {
    /// Cancellable until handed to the shipping provider.
    #[default]
    BeforeShipment,
    /// Legacy behavior: cancel regardless of current status.
    AnyStatus,
}

impl CancellationPolicy {
    pub fn permits(self, status: OrderStatus) -> bool {
        match self {
            Self::AnyStatus => true,
            Self::BeforeShipment => {
                matches!(status, OrderStatus::Pending | OrderStatus::Confirmed)
            }
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "before-shipment" => Some(Self::BeforeShipment),
            "any-status" => Some(Self::AnyStatus),
            _ => None,
        }
    }
}

/// One snapshot-priced item within an order, copied verbatim from a cart
/// line at split time. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Option<Uuid>,
    pub size: Option<String>,
    pub quantity: i32,
    pub price: PriceSnapshot,
}

/// One seller's portion of a checkout. Totals are frozen at creation and
/// never recomputed from the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable business identifier, `ORD-<timestamp>-<sellerId>`.
    pub business_id: String,
    pub user_id: Uuid,
    pub seller_id: Uuid,
    pub shipping_address_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub list_total: i64,
    pub selling_total: i64,
    pub total_items: i32,
    pub status: OrderStatus,
    pub payment: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub deliver_due: DateTime<Utc>,
}

impl Order {
    /// Materialize a draft produced by [`split_by_seller`] into an order
    /// for `user_id`, shipping to `shipping_address_id`.
    pub fn from_draft(draft: OrderDraft, user_id: Uuid, shipping_address_id: Uuid) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let lines = draft
            .lines
            .into_iter()
            .map(|l| OrderLine {
                id: Uuid::new_v4(),
                order_id: id,
                product_id: l.product_id,
                user_id: Some(user_id),
                size: l.size,
                quantity: l.quantity,
                price: l.price,
            })
            .collect();
        Self {
            id,
            business_id: business_order_id(draft.seller_id),
            user_id,
            seller_id: draft.seller_id,
            shipping_address_id,
            lines,
            list_total: draft.list_total,
            selling_total: draft.selling_total,
            total_items: draft.total_items,
            status: OrderStatus::Pending,
            payment: PaymentDetails::default(),
            created_at: now,
            deliver_due: now + Duration::days(DELIVERY_LEAD_DAYS),
        }
    }

    pub fn transition(&mut self, to: OrderStatus) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return Err(Error::InvalidStateTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }
}

/// Shipping destination captured at checkout and linked to the user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub zip: String,
    pub country: String,
    pub phone: Option<String>,
}

/// One seller's group of cart lines, before order materialization.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub seller_id: Uuid,
    pub lines: Vec<CartLine>,
    pub list_total: i64,
    pub selling_total: i64,
    pub total_items: i32,
}

/// Partition cart lines by seller. A complete partition: every input line
/// lands in exactly one draft, and drafts come out in stable seller order.
pub fn split_by_seller(lines: &[(CartLine, Uuid)]) -> Vec<OrderDraft> {
    let mut by_seller: BTreeMap<Uuid, Vec<CartLine>> = BTreeMap::new();
    for (line, seller_id) in lines {
        by_seller.entry(*seller_id).or_default().push(line.clone());
    }
    by_seller
        .into_iter()
        .map(|(seller_id, lines)| {
            let mut totals = PriceSnapshot::zero();
            let mut total_items = 0i32;
            for line in &lines {
                totals = totals.add(&line.price);
                total_items += line.quantity;
            }
            OrderDraft {
                seller_id,
                lines,
                list_total: totals.list,
                selling_total: totals.selling,
                total_items,
            }
        })
        .collect()
}

static LAST_ORDER_TS: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp that never repeats within this process, so two
/// orders created in the same millisecond still get distinct business ids.
fn next_order_timestamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_ORDER_TS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_ORDER_TS.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}

pub fn business_order_id(seller_id: Uuid) -> String {
    format!("ORD-{}-{}", next_order_timestamp(), seller_id)
}
