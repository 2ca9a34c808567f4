//! Aggregates module
pub mod cart;
pub mod order;
pub mod payment;

pub use cart::{Cart, CartLine, CartOwner, MergePlan};
pub use order::{CancellationPolicy, Order, OrderDraft, OrderLine, OrderStatus};
pub use payment::PaymentOrder;
