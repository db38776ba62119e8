//! Catalog endpoints. These are public; no credential is required.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{Money, Product};
use serde::{Deserialize, Serialize};
use store::Store;

use super::parse_product_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub price_cents: i64,
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock_qty: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            price_cents: product.price.cents(),
            stock_qty: product.stock_qty,
            updated_at: product.updated_at,
        }
    }
}

// -- Handlers --

/// GET /products: the whole catalog, ordered by id.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.engine.ledger().products().await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// GET /products/{id}: a single product with its current stock.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .engine
        .ledger()
        .product(&product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {product_id} not found")))?;
    Ok(Json(product.into()))
}

/// PUT /products/{id}: register a product or change its name and price.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<RegisterProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let Json(req) = payload?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    let product = state
        .engine
        .ledger()
        .register_product(&product_id, name, Money::from_cents(req.price_cents))
        .await?;
    Ok(Json(product.into()))
}

/// POST /products/{id}/restock: add units to a product's stock.
#[tracing::instrument(skip(state, payload))]
pub async fn restock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let Json(req) = payload?;
    let quantity = u32::try_from(req.quantity).map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid quantity: {} (must be between 1 and {})",
            req.quantity,
            u32::MAX
        ))
    })?;

    let product = state.engine.ledger().restock(&product_id, quantity).await?;
    Ok(Json(product.into()))
}
