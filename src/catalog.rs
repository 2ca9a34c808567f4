//! Product catalog collaborator
//!
//! The cart engine never owns product data; it consumes price/seller
//! snapshots through this seam. Production wiring is the Postgres-backed
//! lookup; [`MemoryCatalog`] backs tests and local experiments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{Error, Result};

/// Price and seller snapshot for a product at lookup time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    /// Maximum retail (list) unit price in minor units.
    pub list_price: i64,
    /// Discounted unit price in minor units.
    pub selling_price: i64,
    pub seller_id: Uuid,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(&self, product_id: Uuid) -> Result<ProductSnapshot>;
}

/// Catalog backed by the `products` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn lookup(&self, product_id: Uuid) -> Result<ProductSnapshot> {
        let row: Option<(i64, i64, Uuid)> = sqlx::query_as(
            "SELECT list_price, selling_price, seller_id FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        let (list_price, selling_price, seller_id) = row.ok_or(Error::ProductNotFound)?;
        Ok(ProductSnapshot { product_id, list_price, selling_price, seller_id })
    }
}

/// Fixed in-memory catalog.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<HashMap<Uuid, ProductSnapshot>>,
}

impl MemoryCatalog {
    pub fn new(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        Self {
            products: Arc::new(products.into_iter().map(|p| (p.product_id, p)).collect()),
        }
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn lookup(&self, product_id: Uuid) -> Result<ProductSnapshot> {
        self.products.get(&product_id).copied().ok_or(Error::ProductNotFound)
    }
}
