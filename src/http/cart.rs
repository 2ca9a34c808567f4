//! Cart endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::domain::CartOwner;
use crate::Result;

use super::{resolve_user, temp_cart_id, AppState, TEMP_CART_COOKIE, TEMP_CART_TTL_SECS};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", put(add_to_cart).get(get_cart))
        .route("/cart/items/:id", patch(update_item).delete(delete_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartParams {
    #[serde(rename = "product-id")]
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Add a line to the requester's cart. Mints the temp cookie for first-time
/// guests; when both a temp cookie and a resolved identity are present, the
/// guest cart is merged before the add.
async fn add_to_cart(
    State(state): State<AppState>,
    Query(params): Query<AddToCartParams>,
    headers: HeaderMap,
) -> Result<Response> {
    params.validate()?;
    let user = resolve_user(&state.identity, &headers).await?;
    let (temp_id, minted) = match temp_cart_id(&headers) {
        Some(temp_id) => (temp_id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    if let Some(user_id) = user {
        state.carts.merge_temp_cart(&temp_id, user_id).await?;
    }
    let owner = match user {
        Some(user_id) => CartOwner::User(user_id),
        None => CartOwner::Anonymous(temp_id.clone()),
    };
    let line = state.carts.add_item(&owner, params.product_id, params.quantity).await?;

    let mut response = (
        StatusCode::CREATED,
        Json(json!({"message": "Item added to cart", "temp_id": temp_id, "line": line})),
    )
        .into_response();
    if minted {
        let cookie =
            format!("{TEMP_CART_COOKIE}={temp_id}; Path=/; Max-Age={TEMP_CART_TTL_SECS}");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    Ok(response)
}

/// The requester's cart, or `null` when they have none.
async fn get_cart(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let user = resolve_user(&state.identity, &headers).await?;
    let owner = match (user, temp_cart_id(&headers)) {
        (Some(user_id), _) => CartOwner::User(user_id),
        (None, Some(temp_id)) => CartOwner::Anonymous(temp_id),
        (None, None) => return Ok(Json(serde_json::Value::Null).into_response()),
    };
    let cart = state.carts.get_cart(&owner).await?;
    Ok(Json(cart).into_response())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemPayload {
    #[validate(range(min = 1))]
    pub quantity: i32,
}

async fn update_item(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateItemPayload>,
) -> Result<Response> {
    payload.validate()?;
    let owner = requester_owner(&state, &headers).await?;
    let line = state.carts.update_item(&owner, line_id, payload.quantity).await?;
    Ok(Json(line).into_response())
}

async fn delete_item(
    State(state): State<AppState>,
    Path(line_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response> {
    let owner = requester_owner(&state, &headers).await?;
    let line = state.carts.delete_item(&owner, line_id).await?;
    Ok(Json(line).into_response())
}

/// Identity the line-ownership check runs against. A request with neither
/// credential nor cookie cannot own anything.
async fn requester_owner(state: &AppState, headers: &HeaderMap) -> Result<CartOwner> {
    let user = resolve_user(&state.identity, headers).await?;
    match (user, temp_cart_id(headers)) {
        (Some(user_id), _) => Ok(CartOwner::User(user_id)),
        (None, Some(temp_id)) => Ok(CartOwner::Anonymous(temp_id)),
        (None, None) => Err(crate::Error::NotAuthorized),
    }
}
