//! Service-level tests for the cart → order → payment pipeline.
//!
//! Each test provisions its own database via `#[sqlx::test]` and runs the
//! bundled migrations. The catalog is the in-memory seam so product and
//! seller fixtures need no seeding.

use std::sync::Arc;

use cartwheel::catalog::{MemoryCatalog, ProductSnapshot};
use cartwheel::domain::aggregates::order::ShippingAddress;
use cartwheel::domain::{CancellationPolicy, CartOwner, OrderStatus};
use cartwheel::events::EventBus;
use cartwheel::service::{CartService, OrderService, PaymentService, StubGateway};
use cartwheel::Error;
use sqlx::PgPool;
use uuid::Uuid;

struct Fixture {
    carts: CartService,
    orders: OrderService,
    payments: PaymentService,
    p1: ProductSnapshot,
    p2: ProductSnapshot,
}

fn fixture(pool: PgPool, policy: CancellationPolicy) -> Fixture {
    let p1 = ProductSnapshot {
        product_id: Uuid::new_v4(),
        list_price: 100,
        selling_price: 80,
        seller_id: Uuid::new_v4(),
    };
    let p2 = ProductSnapshot {
        product_id: Uuid::new_v4(),
        list_price: 50,
        selling_price: 50,
        seller_id: Uuid::new_v4(),
    };
    let catalog = Arc::new(MemoryCatalog::new([p1, p2]));
    let events = EventBus::default();
    Fixture {
        carts: CartService::new(pool.clone(), catalog.clone(), events.clone()),
        orders: OrderService::new(pool.clone(), catalog, events, policy),
        payments: PaymentService::new(pool, Arc::new(StubGateway)),
        p1,
        p2,
    }
}

async fn seed_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
        .bind(id)
        .bind(format!("{id}@example.com"))
        .execute(pool)
        .await
        .unwrap();
    id
}

fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Ada".into(),
        street: "1 Main St".into(),
        city: "Lagos".into(),
        state: None,
        zip: "100001".into(),
        country: "NG".into(),
        phone: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn add_item_accumulates_and_recomputes_totals(pool: PgPool) {
    let f = fixture(pool, CancellationPolicy::default());
    let owner = CartOwner::Anonymous("t1".into());

    let line = f.carts.add_item(&owner, f.p1.product_id, 2).await.unwrap();
    assert_eq!(line.quantity, 2);
    assert_eq!(line.price.selling, 160);

    let line = f.carts.add_item(&owner, f.p1.product_id, 1).await.unwrap();
    assert_eq!(line.quantity, 3);
    assert_eq!(line.price.selling, 240);

    let cart = f.carts.get_cart(&owner).await.unwrap().unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.totals.quantity, 3);
    assert_eq!(cart.totals.list_total, 300);
    assert_eq!(cart.totals.selling_total, 240);
    assert_eq!(cart.totals.discount_pct, 20);
}

#[sqlx::test(migrations = "./migrations")]
async fn add_item_rejects_bad_input(pool: PgPool) {
    let f = fixture(pool, CancellationPolicy::default());
    let owner = CartOwner::Anonymous("t1".into());

    let err = f.carts.add_item(&owner, f.p1.product_id, 0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidQuantity));

    let err = f.carts.add_item(&owner, Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, Error::ProductNotFound));

    // Neither failure should have created a cart.
    assert!(f.carts.get_cart(&owner).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn merge_reassigns_when_user_has_no_cart(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;
    let temp = CartOwner::Anonymous("t1".into());

    f.carts.add_item(&temp, f.p1.product_id, 2).await.unwrap();
    f.carts.merge_temp_cart("t1", user).await.unwrap();

    assert!(f.carts.get_cart(&temp).await.unwrap().is_none());
    let cart = f.carts.get_cart(&CartOwner::User(user)).await.unwrap().unwrap();
    assert_eq!(cart.owner, CartOwner::User(user));
    assert_eq!(cart.totals.selling_total, 160);
    assert_eq!(cart.totals.discount_pct, 20);
    assert!(cart.lines.iter().all(|l| l.user_id == Some(user)));
}

#[sqlx::test(migrations = "./migrations")]
async fn merge_is_idempotent_for_consumed_temp_id(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;
    let temp = CartOwner::Anonymous("t1".into());

    f.carts.add_item(&temp, f.p1.product_id, 2).await.unwrap();
    f.carts.merge_temp_cart("t1", user).await.unwrap();
    let before = f.carts.get_cart(&CartOwner::User(user)).await.unwrap().unwrap();

    // The temp id is consumed; a second merge must not alter the cart.
    f.carts.merge_temp_cart("t1", user).await.unwrap();
    let after = f.carts.get_cart(&CartOwner::User(user)).await.unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.totals, before.totals);
    assert_eq!(after.lines, before.lines);
}

#[sqlx::test(migrations = "./migrations")]
async fn merge_combines_into_existing_cart_and_conserves_quantity(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;
    let user_owner = CartOwner::User(user);
    let temp = CartOwner::Anonymous("t1".into());

    f.carts.add_item(&user_owner, f.p1.product_id, 1).await.unwrap();
    f.carts.add_item(&temp, f.p1.product_id, 2).await.unwrap();
    f.carts.add_item(&temp, f.p2.product_id, 4).await.unwrap();

    let user_qty = f.carts.get_cart(&user_owner).await.unwrap().unwrap().totals.quantity;
    let temp_qty = f.carts.get_cart(&temp).await.unwrap().unwrap().totals.quantity;

    f.carts.merge_temp_cart("t1", user).await.unwrap();

    let merged = f.carts.get_cart(&user_owner).await.unwrap().unwrap();
    assert_eq!(merged.totals.quantity, user_qty + temp_qty);
    assert_eq!(merged.lines.len(), 2);
    let p1_line = merged.line_for_product(f.p1.product_id).unwrap();
    assert_eq!(p1_line.quantity, 3);
    assert_eq!(p1_line.price.selling, 240); // unit ratio kept: 3 × 80
    let p2_line = merged.line_for_product(f.p2.product_id).unwrap();
    assert_eq!(p2_line.user_id, Some(user));
    assert!(f.carts.get_cart(&temp).await.unwrap().is_none());

    let line_sum: i32 = merged.lines.iter().map(|l| l.quantity).sum();
    assert_eq!(line_sum, merged.totals.quantity);
}

#[sqlx::test(migrations = "./migrations")]
async fn line_mutation_requires_ownership(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let owner = CartOwner::Anonymous("t1".into());
    let stranger = CartOwner::Anonymous("t2".into());

    let line = f.carts.add_item(&owner, f.p1.product_id, 2).await.unwrap();

    let err = f.carts.update_item(&stranger, line.id, 5).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized));
    let err = f.carts.delete_item(&stranger, line.id).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized));

    // A missing line reads as not-found, not as an authorization failure.
    let err = f.carts.update_item(&owner, Uuid::new_v4(), 5).await.unwrap_err();
    assert!(matches!(err, Error::CartLineNotFound));

    // The authorized path returns the mutated entity.
    let updated = f.carts.update_item(&owner, line.id, 5).await.unwrap();
    assert_eq!(updated.quantity, 5);
    assert_eq!(updated.price.selling, 400);
    let deleted = f.carts.delete_item(&owner, line.id).await.unwrap();
    assert_eq!(deleted.id, line.id);
    let cart = f.carts.get_cart(&owner).await.unwrap().unwrap();
    assert!(cart.is_empty());
    assert_eq!(cart.totals.selling_total, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn checkout_splits_per_seller_and_consumes_cart(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;
    let temp = CartOwner::Anonymous("t1".into());

    // The documented walkthrough: P1 ×2 as guest, log in, P2 ×1, checkout.
    f.carts.add_item(&temp, f.p1.product_id, 2).await.unwrap();
    f.carts.merge_temp_cart("t1", user).await.unwrap();
    f.carts.add_item(&CartOwner::User(user), f.p2.product_id, 1).await.unwrap();

    let cart = f.carts.get_cart(&CartOwner::User(user)).await.unwrap().unwrap();
    assert_eq!(cart.totals.list_total, 250);
    assert_eq!(cart.totals.selling_total, 210);
    assert_eq!(cart.totals.discount_pct, 16);

    let orders = f.orders.create_orders(user, &address()).await.unwrap();
    assert_eq!(orders.len(), 2);

    let by_seller = |seller: Uuid| orders.iter().find(|o| o.seller_id == seller).unwrap();
    assert_eq!(by_seller(f.p1.seller_id).selling_total, 160);
    assert_eq!(by_seller(f.p2.seller_id).selling_total, 50);
    let total: i64 = orders.iter().map(|o| o.selling_total).sum();
    assert_eq!(total, 210);

    let emitted: usize = orders.iter().map(|o| o.lines.len()).sum();
    assert_eq!(emitted, 2);
    for order in &orders {
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.business_id.starts_with("ORD-"));
        assert!(order.lines.iter().all(|l| l.order_id == order.id));
    }

    // Checkout consumed the cart: the same lines cannot be ordered twice.
    let cart = f.carts.get_cart(&CartOwner::User(user)).await.unwrap().unwrap();
    assert!(cart.is_empty());
    assert_eq!(cart.totals.selling_total, 0);
    let err = f.orders.create_orders(user, &address()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn checkout_reuses_known_address(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;

    f.carts.add_item(&CartOwner::User(user), f.p1.product_id, 1).await.unwrap();
    let first = f.orders.create_orders(user, &address()).await.unwrap();
    f.carts.add_item(&CartOwner::User(user), f.p1.product_id, 1).await.unwrap();
    let second = f.orders.create_orders(user, &address()).await.unwrap();

    assert_eq!(first[0].shipping_address_id, second[0].shipping_address_id);
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM addresses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn order_lifecycle_and_cancellation_policy(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;
    let other = seed_user(&pool).await;

    f.carts.add_item(&CartOwner::User(user), f.p1.product_id, 1).await.unwrap();
    let order = f.orders.create_orders(user, &address()).await.unwrap().remove(0);

    let err = f.orders.cancel_order(order.id, other).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized));

    let err = f.orders.update_order_status(order.id, OrderStatus::Delivered).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));

    f.orders.update_order_status(order.id, OrderStatus::Confirmed).await.unwrap();
    f.orders.update_order_status(order.id, OrderStatus::Shipped).await.unwrap();

    // Shipped orders are beyond the default cancellation window.
    let err = f.orders.cancel_order(order.id, user).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));

    f.orders.update_order_status(order.id, OrderStatus::Delivered).await.unwrap();
    let delivered = f.orders.find_order(order.id).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    // Legacy-compatible deployments may cancel from any status.
    let lax = fixture(pool.clone(), CancellationPolicy::AnyStatus);
    let cancelled = lax.orders.cancel_order(order.id, user).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[sqlx::test(migrations = "./migrations")]
async fn cancel_before_shipment_succeeds(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;

    f.carts.add_item(&CartOwner::User(user), f.p1.product_id, 1).await.unwrap();
    let order = f.orders.create_orders(user, &address()).await.unwrap().remove(0);

    let cancelled = f.orders.cancel_order(order.id, user).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let reloaded = f.orders.find_order(order.id).await.unwrap();
    assert_eq!(reloaded.status, OrderStatus::Cancelled);
}

#[sqlx::test(migrations = "./migrations")]
async fn payment_order_aggregates_and_settles_once(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;

    f.carts.add_item(&CartOwner::User(user), f.p1.product_id, 2).await.unwrap();
    f.carts.add_item(&CartOwner::User(user), f.p2.product_id, 1).await.unwrap();
    let orders = f.orders.create_orders(user, &address()).await.unwrap();
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    let po = f.payments.create_payment_order(user, &order_ids).await.unwrap();
    assert_eq!(po.amount, 210);
    let link_id = po.payment_link_id.clone().unwrap();

    let by_link = f.payments.get_by_payment_link(&link_id).await.unwrap();
    assert_eq!(by_link.id, po.id);
    assert_eq!(by_link.order_ids.len(), 2);

    assert!(f.payments.proceed(po.id, "pay_1", &link_id).await.unwrap());
    let settled = f.payments.get_payment_order(po.id).await.unwrap();
    assert_eq!(settled.payment_id.as_deref(), Some("pay_1"));

    // Second settlement attempt is a no-op, not an error.
    assert!(!f.payments.proceed(po.id, "pay_2", &link_id).await.unwrap());
    let after = f.payments.get_payment_order(po.id).await.unwrap();
    assert_eq!(after.amount, settled.amount);
    assert_eq!(after.status, settled.status);
    assert_eq!(after.payment_id.as_deref(), Some("pay_1"));
}

#[sqlx::test(migrations = "./migrations")]
async fn payment_order_guards_inputs(pool: PgPool) {
    let f = fixture(pool.clone(), CancellationPolicy::default());
    let user = seed_user(&pool).await;
    let other = seed_user(&pool).await;

    let err = f.payments.create_payment_order(user, &[]).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = f.payments.create_payment_order(user, &[Uuid::new_v4()]).await.unwrap_err();
    assert!(matches!(err, Error::OrderNotFound));

    f.carts.add_item(&CartOwner::User(user), f.p1.product_id, 1).await.unwrap();
    let order = f.orders.create_orders(user, &address()).await.unwrap().remove(0);
    let err = f.payments.create_payment_order(other, &[order.id]).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized));

    let err = f.payments.get_payment_order(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::PaymentOrderNotFound));
}
