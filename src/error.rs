//! Error taxonomy
//!
//! Every domain error carries a stable machine-readable kind so callers can
//! dispatch on it without parsing messages. Persistence failures propagate
//! untranslated and roll back the surrounding transaction.

use thiserror::Error;

use crate::domain::OrderStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Cart not found")]
    CartNotFound,

    #[error("Cart line not found")]
    CartLineNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment order not found")]
    PaymentOrderNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// Stable tag surfaced to API clients alongside the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProductNotFound => "product_not_found",
            Self::CartNotFound => "cart_not_found",
            Self::CartLineNotFound => "cart_line_not_found",
            Self::OrderNotFound => "order_not_found",
            Self::PaymentOrderNotFound => "payment_order_not_found",
            Self::UserNotFound => "user_not_found",
            Self::InvalidQuantity => "invalid_quantity",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::NotAuthorized => "not_authorized",
            Self::Validation(_) => "validation_failed",
            Self::Database(_) => "internal",
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}
