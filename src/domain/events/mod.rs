//! Domain events
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Cart(CartEvent::Merged { .. }) => "commerce.cart.merged",
            Self::Order(OrderEvent::Created { .. }) => "commerce.order.created",
            Self::Order(OrderEvent::Cancelled { .. }) => "commerce.order.cancelled",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartEvent {
    Merged { user_id: Uuid, cart_id: Uuid, absorbed_lines: usize },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { user_id: Uuid, cart_id: Uuid, order_ids: Vec<Uuid> },
    Cancelled { order_id: Uuid, user_id: Uuid },
}
