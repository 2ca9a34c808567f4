//! Postgres persistence.
//!
//! Store functions take a `&mut PgConnection` so the calling service owns
//! the transaction boundary: one public operation, one transaction,
//! committed or rolled back at that operation's edge.

pub mod cart;
pub mod order;
pub mod payment;
