//! Payment endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::Result;

use super::{resolve_user, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment_order))
        .route("/payments/proceed", post(proceed))
        .route("/payments/:id", get(get_payment_order))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentPayload {
    pub order_ids: Vec<Uuid>,
}

async fn create_payment_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<Response> {
    let Some(user_id) = resolve_user(&state.identity, &headers).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    let payment_order = state.payments.create_payment_order(user_id, &payload.order_ids).await?;
    Ok((StatusCode::CREATED, Json(payment_order)).into_response())
}

/// Gateway settlement callback. Safe to deliver more than once; repeats
/// report `processed: false` and change nothing.
#[derive(Debug, Deserialize)]
pub struct ProceedPayload {
    pub payment_link_id: String,
    pub payment_id: String,
}

async fn proceed(
    State(state): State<AppState>,
    Json(payload): Json<ProceedPayload>,
) -> Result<Response> {
    let payment_order = state.payments.get_by_payment_link(&payload.payment_link_id).await?;
    let processed = state
        .payments
        .proceed(payment_order.id, &payload.payment_id, &payload.payment_link_id)
        .await?;
    Ok(Json(json!({"payment_order_id": payment_order.id, "processed": processed})).into_response())
}

async fn get_payment_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let payment_order = state.payments.get_payment_order(id).await?;
    Ok(Json(payment_order).into_response())
}
