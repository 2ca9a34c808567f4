//! Transactional engines over the domain model.
//!
//! Each public operation opens its own transaction, takes the per-owner
//! advisory lock where it mutates a cart, and commits or rolls back at its
//! own boundary. Events publish after commit only.

pub mod cart;
pub mod order;
pub mod payment;

pub use cart::CartService;
pub use order::OrderService;
pub use payment::{PaymentGateway, PaymentLink, PaymentService, StubGateway};
