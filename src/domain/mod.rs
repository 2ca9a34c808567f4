//! Domain model: aggregates, value objects and events.

pub mod aggregates;
pub mod events;
pub mod payment;
pub mod value_objects;

pub use aggregates::cart::{Cart, CartLine, CartOwner, MergePlan};
pub use aggregates::order::{CancellationPolicy, Order, OrderDraft, OrderLine, OrderStatus};
pub use aggregates::payment::PaymentOrder;
