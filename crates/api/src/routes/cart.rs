//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::{DateTime, Utc};
use common::Cart;
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_product_id;
use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct RemoveItemRequest {
    pub product_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub owner_id: String,
    pub items: Vec<CartItemResponse>,
    pub total_quantity: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let total_quantity = cart.total_quantity();
        Self {
            owner_id: cart.owner_id.to_string(),
            items: cart
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                })
                .collect(),
            total_quantity,
            updated_at: cart.updated_at,
        }
    }
}

// -- Handlers --

/// GET /cart: the caller's cart, created empty on first access.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(owner_id): Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.engine.carts().get(owner_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/add: add units of a product.
#[tracing::instrument(skip(state, payload))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(owner_id): Identity,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let product_id = parse_product_id(&req.product_id)?;

    let cart = state
        .engine
        .carts()
        .add(owner_id, product_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// POST /cart/remove: drop a product's line.
#[tracing::instrument(skip(state, payload))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(owner_id): Identity,
    payload: Result<Json<RemoveItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let product_id = parse_product_id(&req.product_id)?;

    let cart = state.engine.carts().remove(owner_id, product_id).await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/update: set a product's exact quantity.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(owner_id): Identity,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let product_id = parse_product_id(&req.product_id)?;

    let cart = state
        .engine
        .carts()
        .update(owner_id, product_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/clear: empty the cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(owner_id): Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.engine.carts().clear(owner_id).await?;
    Ok(Json(cart.into()))
}
