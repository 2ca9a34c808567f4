//! Payment engine: aggregate a checkout's orders under one payable amount.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::PaymentOrder;
use crate::store;
use crate::{Error, Result};

/// External payment link handed out by the gateway.
#[derive(Clone, Debug)]
pub struct PaymentLink {
    pub link_id: String,
    pub url: String,
}

/// Gateway seam. The real integration lives outside this service; the stub
/// mints placeholder links with unique ids.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(
        &self,
        user_id: Uuid,
        amount: i64,
        payment_order_id: Uuid,
    ) -> Result<PaymentLink>;
}

#[derive(Clone, Default)]
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_link(
        &self,
        user_id: Uuid,
        amount: i64,
        payment_order_id: Uuid,
    ) -> Result<PaymentLink> {
        let link_id = format!("plink_{}", Uuid::new_v4().simple());
        tracing::info!(
            user_id = %user_id,
            payment_order_id = %payment_order_id,
            amount,
            link_id,
            "payment link created (stub gateway)"
        );
        Ok(PaymentLink {
            url: format!("https://pay.example.com/links/{link_id}"),
            link_id,
        })
    }
}

#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { pool, gateway }
    }

    /// Group the given orders under one payment order. The amount is the
    /// sum of the orders' selling totals, fixed at creation.
    pub async fn create_payment_order(
        &self,
        user_id: Uuid,
        order_ids: &[Uuid],
    ) -> Result<PaymentOrder> {
        if order_ids.is_empty() {
            return Err(Error::Validation("payment order needs at least one order".into()));
        }
        let mut tx = self.pool.begin().await?;
        let mut orders = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let order =
                store::order::find_order(&mut tx, *order_id).await?.ok_or(Error::OrderNotFound)?;
            if order.user_id != user_id {
                return Err(Error::NotAuthorized);
            }
            orders.push(order);
        }
        let mut payment_order = PaymentOrder::create(user_id, &orders);
        store::payment::insert_payment_order(&mut tx, &payment_order).await?;

        let link = self
            .gateway
            .create_payment_link(user_id, payment_order.amount, payment_order.id)
            .await?;
        store::payment::set_payment_link(&mut tx, payment_order.id, &link.link_id).await?;
        payment_order.payment_link_id = Some(link.link_id);
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            payment_order_id = %payment_order.id,
            amount = payment_order.amount,
            "payment order created"
        );
        Ok(payment_order)
    }

    pub async fn get_payment_order(&self, id: Uuid) -> Result<PaymentOrder> {
        let mut conn = self.pool.acquire().await?;
        store::payment::find_by_id(&mut conn, id).await?.ok_or(Error::PaymentOrderNotFound)
    }

    pub async fn get_by_payment_link(&self, payment_link_id: &str) -> Result<PaymentOrder> {
        let mut conn = self.pool.acquire().await?;
        store::payment::find_by_link_id(&mut conn, payment_link_id)
            .await?
            .ok_or(Error::PaymentOrderNotFound)
    }

    /// Settle a pending payment order. Returns `true` on the first call,
    /// `false` on any repeat; the repeat changes nothing (double-settlement
    /// guard).
    pub async fn proceed(
        &self,
        payment_order_id: Uuid,
        payment_id: &str,
        payment_link_id: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        store::payment::find_by_id(&mut tx, payment_order_id)
            .await?
            .ok_or(Error::PaymentOrderNotFound)?;
        let settled =
            store::payment::proceed(&mut tx, payment_order_id, payment_id, payment_link_id).await?;
        tx.commit().await?;

        if settled {
            tracing::info!(payment_order_id = %payment_order_id, payment_id, "payment order completed");
        } else {
            tracing::warn!(
                payment_order_id = %payment_order_id,
                "payment order already processed, ignoring repeat settlement"
            );
        }
        Ok(settled)
    }
}
