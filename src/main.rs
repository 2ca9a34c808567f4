//! Cartwheel - Multi-seller cart and checkout service

use std::sync::Arc;

use anyhow::Result;
use cartwheel::catalog::PgCatalog;
use cartwheel::config::Config;
use cartwheel::events::EventBus;
use cartwheel::http::{build_router, AppState};
use cartwheel::identity::IdentityResolver;
use cartwheel::service::{CartService, OrderService, PaymentService, StubGateway};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let events = EventBus::connect(config.nats_url.as_deref()).await;
    let catalog = Arc::new(PgCatalog::new(db.clone()));
    let state = AppState {
        carts: CartService::new(db.clone(), catalog.clone(), events.clone()),
        orders: OrderService::new(
            db.clone(),
            catalog,
            events.clone(),
            config.cancellation_policy,
        ),
        payments: PaymentService::new(db.clone(), Arc::new(StubGateway)),
        identity: IdentityResolver::new(db),
    };
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 Cartwheel listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
