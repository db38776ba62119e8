//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use common::ProductId;

use crate::error::ApiError;

/// Validates a product id taken from a request.
fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(
            "product_id must not be empty".to_string(),
        ));
    }
    Ok(ProductId::new(trimmed))
}
