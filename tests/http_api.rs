//! HTTP smoke test: drives the real router over a loopback listener, end
//! to end from the anonymous cookie through merge, checkout and payment.

use std::sync::Arc;

use cartwheel::catalog::{MemoryCatalog, ProductSnapshot};
use cartwheel::domain::CancellationPolicy;
use cartwheel::events::EventBus;
use cartwheel::http::{build_router, AppState};
use cartwheel::identity::IdentityResolver;
use cartwheel::service::{CartService, OrderService, PaymentService, StubGateway};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

struct Server {
    base: String,
    p1: ProductSnapshot,
    p2: ProductSnapshot,
}

async fn start_server(pool: PgPool) -> Server {
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
    let state = AppState {
        carts: CartService::new(pool.clone(), catalog.clone(), events.clone()),
        orders: OrderService::new(
            pool.clone(),
            catalog,
            events,
            CancellationPolicy::default(),
        ),
        payments: PaymentService::new(pool.clone(), Arc::new(StubGateway)),
        identity: IdentityResolver::new(pool),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Server { base: format!("http://{addr}"), p1, p2 }
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

#[sqlx::test(migrations = "./migrations")]
async fn guest_to_checkout_flow(pool: PgPool) {
    let server = start_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let health: Value =
        client.get(format!("{}/health", server.base)).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "healthy");

    // Guest add mints the temp-cart cookie.
    let res = client
        .put(format!(
            "{}/api/v1/cart?product-id={}&quantity=2",
            server.base, server.p1.product_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let set_cookie = res.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("TEMP_CART_ID="));
    assert!(set_cookie.contains("Max-Age=604800"));
    let body: Value = res.json().await.unwrap();
    let temp_id = body["temp_id"].as_str().unwrap().to_string();
    let cookie = format!("TEMP_CART_ID={temp_id}");

    let cart: Value = client
        .get(format!("{}/api/v1/cart", server.base))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["totals"]["selling_total"], 160);
    assert_eq!(cart["totals"]["discount_pct"], 20);

    // Logging in (bearer + cookie) merges the guest cart before the add.
    let user = seed_user(&pool).await;
    let auth = format!("Bearer uid:{user}");
    let res = client
        .put(format!(
            "{}/api/v1/cart?product-id={}&quantity=1",
            server.base, server.p2.product_id
        ))
        .header("Cookie", &cookie)
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let cart: Value = client
        .get(format!("{}/api/v1/cart", server.base))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["owner"]["kind"], "user");
    assert_eq!(cart["totals"]["quantity"], 3);
    assert_eq!(cart["totals"]["selling_total"], 210);

    // Checkout without a credential is refused outright.
    let address = json!({
        "name": "Ada", "street": "1 Main St", "city": "Lagos",
        "zip": "100001", "country": "NG"
    });
    let res = client
        .post(format!("{}/api/v1/orders/create", server.base))
        .json(&address)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/api/v1/orders/create", server.base))
        .header("Authorization", &auth)
        .json(&address)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let orders: Value = res.json().await.unwrap();
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    let selling: i64 = orders.iter().map(|o| o["selling_total"].as_i64().unwrap()).sum();
    assert_eq!(selling, 210);

    // One payment order over both seller orders; repeat settlement no-ops.
    let order_ids: Vec<&str> = orders.iter().map(|o| o["id"].as_str().unwrap()).collect();
    let res = client
        .post(format!("{}/api/v1/payments", server.base))
        .header("Authorization", &auth)
        .json(&json!({"order_ids": order_ids}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let payment: Value = res.json().await.unwrap();
    assert_eq!(payment["amount"], 210);
    let link_id = payment["payment_link_id"].as_str().unwrap();

    let proceed = |payment_id: &str| {
        client
            .post(format!("{}/api/v1/payments/proceed", server.base))
            .json(&json!({"payment_link_id": link_id, "payment_id": payment_id}))
            .send()
    };
    let first: Value = proceed("pay_1").await.unwrap().json().await.unwrap();
    assert_eq!(first["processed"], true);
    let second: Value = proceed("pay_2").await.unwrap().json().await.unwrap();
    assert_eq!(second["processed"], false);
}

#[sqlx::test(migrations = "./migrations")]
async fn error_responses_carry_stable_kinds(pool: PgPool) {
    let server = start_server(pool.clone()).await;
    let client = reqwest::Client::new();

    // Unknown product on add.
    let res = client
        .put(format!(
            "{}/api/v1/cart?product-id={}&quantity=1",
            server.base,
            Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "product_not_found");

    // Zero quantity is rejected before any cart is touched.
    let res = client
        .put(format!(
            "{}/api/v1/cart?product-id={}&quantity=0",
            server.base, server.p1.product_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_failed");

    // Foreign line mutation is forbidden, distinctly from not-found.
    let guest_res = client
        .put(format!(
            "{}/api/v1/cart?product-id={}&quantity=1",
            server.base, server.p1.product_id
        ))
        .send()
        .await
        .unwrap();
    let body: Value = guest_res.json().await.unwrap();
    let line_id = body["line"]["id"].as_str().unwrap().to_string();
    let res = client
        .patch(format!("{}/api/v1/cart/items/{line_id}", server.base))
        .header("Cookie", "TEMP_CART_ID=someone-else")
        .json(&json!({"quantity": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_authorized");
}
