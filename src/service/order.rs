//! Order engine: checkout split, status transitions, cancellation.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::domain::aggregates::order::{split_by_seller, ShippingAddress};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::{CancellationPolicy, CartOwner, Order, OrderStatus};
use crate::events::EventBus;
use crate::store;
use crate::{Error, Result};

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    catalog: Arc<dyn ProductCatalog>,
    events: EventBus,
    cancellation_policy: CancellationPolicy,
}

impl OrderService {
    pub fn new(
        pool: PgPool,
        catalog: Arc<dyn ProductCatalog>,
        events: EventBus,
        cancellation_policy: CancellationPolicy,
    ) -> Self {
        Self { pool, catalog, events, cancellation_policy }
    }

    /// Split the user's cart into one order per seller.
    ///
    /// Every cart line lands in exactly one order; totals are copied from
    /// the line snapshots, never re-priced. The cart is consumed: checkout
    /// empties it in the same transaction, so the same lines cannot be
    /// checked out twice.
    pub async fn create_orders(
        &self,
        user_id: Uuid,
        address: &ShippingAddress,
    ) -> Result<Vec<Order>> {
        let owner = CartOwner::User(user_id);

        let mut tx = self.pool.begin().await?;
        store::cart::lock_owner(&mut tx, &owner).await?;
        let cart =
            store::cart::find_cart_locked(&mut tx, &owner).await?.ok_or(Error::CartNotFound)?;
        if cart.is_empty() {
            return Err(Error::Validation("cart has no lines to check out".into()));
        }

        let address_id = store::order::ensure_address(&mut tx, user_id, address).await?;

        // Seller comes from the catalog at split time; prices stay frozen
        // in the line snapshots.
        let mut seller_lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = self.catalog.lookup(line.product_id).await?;
            seller_lines.push((line.clone(), product.seller_id));
        }

        let orders: Vec<Order> = split_by_seller(&seller_lines)
            .into_iter()
            .map(|draft| Order::from_draft(draft, user_id, address_id))
            .collect();
        for order in &orders {
            store::order::insert_order(&mut tx, order).await?;
        }
        store::cart::clear_cart(&mut tx, cart.id).await?;
        tx.commit().await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        tracing::info!(
            user_id = %user_id,
            cart_id = %cart.id,
            orders = order_ids.len(),
            "cart split into orders"
        );
        self.events
            .publish(&DomainEvent::Order(OrderEvent::Created {
                user_id,
                cart_id: cart.id,
                order_ids,
            }))
            .await;
        Ok(orders)
    }

    pub async fn find_order(&self, order_id: Uuid) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;
        store::order::find_order(&mut conn, order_id).await?.ok_or(Error::OrderNotFound)
    }

    pub async fn user_orders_history(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        store::order::orders_by_user(&mut conn, user_id).await
    }

    pub async fn seller_orders_history(&self, seller_id: Uuid) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        store::order::orders_by_seller(&mut conn, seller_id).await
    }

    /// Server-driven transition along PENDING → CONFIRMED → SHIPPED →
    /// DELIVERED. Anything off the lifecycle is rejected.
    pub async fn update_order_status(&self, order_id: Uuid, to: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            store::order::find_order(&mut tx, order_id).await?.ok_or(Error::OrderNotFound)?;
        order.transition(to)?;
        store::order::update_status(&mut tx, order_id, to).await?;
        tx.commit().await?;
        tracing::info!(order_id = %order_id, status = %to, "order status updated");
        Ok(order)
    }

    /// Cancel on behalf of the owning user. Which states allow it is a
    /// deployment policy; the default refuses once the order has shipped.
    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let mut order =
            store::order::find_order(&mut tx, order_id).await?.ok_or(Error::OrderNotFound)?;
        if order.user_id != user_id {
            return Err(Error::NotAuthorized);
        }
        if !self.cancellation_policy.permits(order.status) {
            return Err(Error::InvalidStateTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        order.status = OrderStatus::Cancelled;
        store::order::update_status(&mut tx, order_id, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, user_id = %user_id, "order cancelled");
        self.events
            .publish(&DomainEvent::Order(OrderEvent::Cancelled { order_id, user_id }))
            .await;
        Ok(order)
    }
}
