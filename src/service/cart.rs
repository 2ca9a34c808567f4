//! Cart engine: line mutation and the guest-cart merge.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::{Cart, CartLine, CartOwner, MergePlan};
use crate::events::EventBus;
use crate::store;
use crate::{Error, Result};

#[derive(Clone)]
pub struct CartService {
    pool: PgPool,
    catalog: Arc<dyn ProductCatalog>,
    events: EventBus,
}

impl CartService {
    pub fn new(pool: PgPool, catalog: Arc<dyn ProductCatalog>, events: EventBus) -> Self {
        Self { pool, catalog, events }
    }

    /// The owner's cart as persisted, or `None` when they have none yet.
    pub async fn get_cart(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        store::cart::find_cart(&mut conn, owner).await
    }

    /// Add `quantity` of a product to the owner's cart, creating the cart
    /// and the line as needed. Repeated adds accumulate onto the same line.
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartLine> {
        if quantity <= 0 {
            return Err(Error::InvalidQuantity);
        }
        let product = self.catalog.lookup(product_id).await?;

        let mut tx = self.pool.begin().await?;
        store::cart::lock_owner(&mut tx, owner).await?;
        let cart = store::cart::find_or_create_cart(&mut tx, owner).await?;
        let line = store::cart::upsert_line(
            &mut tx,
            cart.id,
            product_id,
            owner.user_id(),
            None,
            quantity,
            product.list_price,
            product.selling_price,
        )
        .await?;
        let mut cart = store::cart::find_cart(&mut tx, owner).await?.ok_or(Error::CartNotFound)?;
        cart.recalculate();
        store::cart::save_totals(&mut tx, cart.id, &cart.totals).await?;
        tx.commit().await?;

        tracing::info!(
            cart_id = %cart.id,
            product_id = %product_id,
            quantity = line.quantity,
            "cart line added"
        );
        Ok(line)
    }

    /// Replace a line's quantity, keeping its snapshot's unit ratio.
    /// Authorized only for the line's cart owner.
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<CartLine> {
        if quantity <= 0 {
            return Err(Error::InvalidQuantity);
        }
        let mut tx = self.pool.begin().await?;
        let (line, line_owner) = self.locked_authorized_line(&mut tx, line_id, owner).await?;
        let price = line.price.rescaled(line.quantity, quantity);
        let updated = store::cart::set_line_quantity(&mut tx, line_id, quantity, price).await?;
        self.recompute_totals(&mut tx, &line_owner).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Remove a line. Authorized only for the line's cart owner.
    pub async fn delete_item(&self, owner: &CartOwner, line_id: Uuid) -> Result<CartLine> {
        let mut tx = self.pool.begin().await?;
        let (line, line_owner) = self.locked_authorized_line(&mut tx, line_id, owner).await?;
        store::cart::delete_line(&mut tx, line_id).await?;
        self.recompute_totals(&mut tx, &line_owner).await?;
        tx.commit().await?;
        Ok(line)
    }

    /// Merge the anonymous cart identified by `temp_id` into `user_id`'s
    /// cart. Invoked when identity becomes known; a missing temp cart makes
    /// this a no-op, so re-invocation is harmless.
    pub async fn merge_temp_cart(&self, temp_id: &str, user_id: Uuid) -> Result<()> {
        let temp_owner = CartOwner::Anonymous(temp_id.to_string());
        let user_owner = CartOwner::User(user_id);

        let mut tx = self.pool.begin().await?;
        // Both owners are locked in sorted key order so a concurrent merge
        // or add cannot deadlock against this one.
        let mut owners = [&temp_owner, &user_owner];
        owners.sort_by_key(|o| o.lock_key());
        for owner in owners {
            store::cart::lock_owner(&mut tx, owner).await?;
        }

        let Some(temp_cart) = store::cart::find_cart_locked(&mut tx, &temp_owner).await? else {
            // Already merged (or never existed): nothing to consume.
            return Ok(());
        };

        let (cart_id, absorbed) = match store::cart::find_cart_locked(&mut tx, &user_owner).await? {
            None => {
                // Adopt the anonymous cart whole; totals are already
                // consistent, no recomputation needed.
                store::cart::reassign_cart(&mut tx, temp_cart.id, user_id).await?;
                (temp_cart.id, temp_cart.lines.len())
            }
            Some(mut user_cart) => {
                let plan = MergePlan::build(&user_cart, &temp_cart, user_id);
                for line in &plan.updated {
                    store::cart::apply_merged_line(&mut tx, line).await?;
                }
                for line in &plan.adopted {
                    store::cart::reparent_line(&mut tx, line.id, user_cart.id, user_id).await?;
                }
                user_cart.apply_merge(&plan);
                store::cart::save_totals(&mut tx, user_cart.id, &user_cart.totals).await?;
                // Consumed lines still hang off the temp cart and go with it.
                store::cart::delete_cart(&mut tx, temp_cart.id).await?;
                (user_cart.id, temp_cart.lines.len())
            }
        };
        tx.commit().await?;

        tracing::info!(user_id = %user_id, cart_id = %cart_id, absorbed, "guest cart merged");
        self.events
            .publish(&DomainEvent::Cart(CartEvent::Merged {
                user_id,
                cart_id,
                absorbed_lines: absorbed,
            }))
            .await;
        Ok(())
    }

    /// Lock-then-authorize for line-level mutation. The lock key is only
    /// known once the line's cart is read, so the line is re-read and the
    /// ownership re-checked after the lock lands (a merge may have moved
    /// it in between). A mismatch is `NotAuthorized`, never a silent
    /// no-op, and is reported distinctly from a missing line.
    async fn locked_authorized_line(
        &self,
        conn: &mut sqlx::PgConnection,
        line_id: Uuid,
        owner: &CartOwner,
    ) -> Result<(CartLine, CartOwner)> {
        let (_, line_owner) =
            store::cart::find_line(conn, line_id).await?.ok_or(Error::CartLineNotFound)?;
        if line_owner != *owner {
            return Err(Error::NotAuthorized);
        }
        store::cart::lock_owner(conn, &line_owner).await?;
        let (line, line_owner) =
            store::cart::find_line(conn, line_id).await?.ok_or(Error::CartLineNotFound)?;
        if line_owner != *owner {
            return Err(Error::NotAuthorized);
        }
        Ok((line, line_owner))
    }

    async fn recompute_totals(
        &self,
        conn: &mut sqlx::PgConnection,
        owner: &CartOwner,
    ) -> Result<()> {
        let mut cart = store::cart::find_cart(conn, owner).await?.ok_or(Error::CartNotFound)?;
        cart.recalculate();
        store::cart::save_totals(conn, cart.id, &cart.totals).await
    }
}
