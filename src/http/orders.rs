//! Order endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::order::ShippingAddress;
use crate::domain::OrderStatus;
use crate::{Error, Result};

use super::{resolve_user, temp_cart_id, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/create", post(create_orders))
        .route("/orders", get(user_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/status", post(update_status))
        .route("/orders/seller/:seller_id", get(seller_orders))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressPayload {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1))]
    pub zip: String,
    #[validate(length(min = 1))]
    pub country: String,
    pub phone: Option<String>,
}

impl AddressPayload {
    fn into_address(self) -> ShippingAddress {
        ShippingAddress {
            name: self.name,
            street: self.street,
            city: self.city,
            state: self.state,
            zip: self.zip,
            country: self.country,
            phone: self.phone,
        }
    }
}

/// Checkout: merge any guest cart, then split the user's cart into one
/// order per seller.
async fn create_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AddressPayload>,
) -> Result<Response> {
    payload.validate()?;
    let Some(user_id) = resolve_user(&state.identity, &headers).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    if let Some(temp_id) = temp_cart_id(&headers) {
        state.carts.merge_temp_cart(&temp_id, user_id).await?;
    }
    let orders = state.orders.create_orders(user_id, &payload.into_address()).await?;
    Ok((StatusCode::CREATED, Json(orders)).into_response())
}

async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let order = state.orders.find_order(id).await?;
    Ok(Json(order).into_response())
}

async fn user_orders(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let Some(user_id) = resolve_user(&state.identity, &headers).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    let orders = state.orders.user_orders_history(user_id).await?;
    Ok(Json(orders).into_response())
}

async fn seller_orders(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
) -> Result<Response> {
    let orders = state.orders.seller_orders_history(seller_id).await?;
    Ok(Json(orders).into_response())
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response> {
    let Some(user_id) = resolve_user(&state.identity, &headers).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    let order = state.orders.cancel_order(id, user_id).await?;
    Ok(Json(order).into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: String,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Response> {
    let status = OrderStatus::parse(&payload.status)
        .ok_or_else(|| Error::Validation(format!("unknown order status: {}", payload.status)))?;
    let order = state.orders.update_order_status(id, status).await?;
    Ok(Json(order).into_response())
}
