//! Payment Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::order::Order;
use crate::domain::payment::{PaymentMethod, PaymentStatus};

/// Groups one or more orders from the same checkout under a single payable
/// amount. The amount is computed once at creation from the grouped orders'
/// selling totals and never recomputed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    /// Transaction id recorded when the gateway settles.
    pub payment_id: Option<String>,
    /// External payment-link id handed out by the gateway.
    pub payment_link_id: Option<String>,
    pub order_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PaymentOrder {
    pub fn create(user_id: Uuid, orders: &[Order]) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount: orders.iter().map(|o| o.selling_total).sum(),
            status: PaymentStatus::Pending,
            method: PaymentMethod::Stripe,
            payment_id: None,
            payment_link_id: None,
            order_ids: orders.iter().map(|o| o.id).collect(),
            created_at: Utc::now(),
        }
    }

    /// One-way PENDING → COMPLETED transition. Returns `false` without
    /// touching anything when the order is already settled or failed; this
    /// is the idempotence guard against double settlement.
    pub fn proceed(&mut self, payment_id: &str, payment_link_id: &str) -> bool {
        if self.status != PaymentStatus::Pending {
            return false;
        }
        self.status = PaymentStatus::Completed;
        self.payment_id = Some(payment_id.to_string());
        self.payment_link_id = Some(payment_link_id.to_string());
        true
    }
}
