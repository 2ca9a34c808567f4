//! HTTP surface.
//!
//! Thin handlers over the service layer: resolve identity, read the temp
//! cart cookie, delegate, map domain errors to stable response kinds.

pub mod cart;
pub mod orders;
pub mod payments;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::identity::{credential_from_bearer, IdentityResolver};
use crate::service::{CartService, OrderService, PaymentService};
use crate::{Error, Result};

/// Cookie carrying the anonymous cart key.
pub const TEMP_CART_COOKIE: &str = "TEMP_CART_ID";
/// Anonymous carts ride a one-week cookie.
pub const TEMP_CART_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub identity: IdentityResolver,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "service": "cartwheel"}))
}

/// Build the full router. Used by main and by integration tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest(
            "/api/v1",
            cart::router().merge(orders::router()).merge(payments::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::ProductNotFound
            | Error::CartNotFound
            | Error::CartLineNotFound
            | Error::OrderNotFound
            | Error::PaymentOrderNotFound
            | Error::UserNotFound => StatusCode::NOT_FOUND,
            Error::InvalidQuantity => StatusCode::BAD_REQUEST,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotAuthorized => StatusCode::FORBIDDEN,
            Error::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal failures must not leak their cause to the caller.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({"error": self.kind(), "message": message}))).into_response()
    }
}

/// Resolve the bearer credential, if any, to a user id.
pub(crate) async fn resolve_user(
    identity: &IdentityResolver,
    headers: &axum::http::HeaderMap,
) -> Result<Option<Uuid>> {
    let Some(raw) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Some(credential) = credential_from_bearer(raw) else {
        return Ok(None);
    };
    identity.resolve(&credential).await
}

/// The anonymous cart key from the request cookies, if present.
pub(crate) fn temp_cart_id(headers: &axum::http::HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == TEMP_CART_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}
