//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, InventoryError, OrderError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or unrecognised credential.
    Unauthorized,
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid credentials".to_string(),
            ),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Cart(CartError::InvalidQuantity { .. }) => StatusCode::BAD_REQUEST,
        DomainError::Inventory(inventory_err) => match inventory_err {
            InventoryError::InsufficientStock(_)
            | InventoryError::AlreadyReleased(_)
            | InventoryError::NotReleased(_) => StatusCode::CONFLICT,
            InventoryError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::InvalidQuantity { .. } | InventoryError::InvalidPrice { .. } => {
                StatusCode::BAD_REQUEST
            }
            InventoryError::ReservationNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DomainError::Order(order_err) => match order_err {
            OrderError::EmptyCart
            | OrderError::UnknownProduct(_)
            | OrderError::TotalOverflow => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrderError::InvalidTransition { .. } | OrderError::ConcurrentUpdate(_) => {
                StatusCode::CONFLICT
            }
        },
        DomainError::Store(StoreError::StockOverflow(_)) => StatusCode::BAD_REQUEST,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        // Persistence details stay in the logs
        tracing::error!(error = %err, "internal server error");
        return (status, "Internal server error".to_string());
    }

    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, OrderStatus, ProductId};
    use domain::Shortage;

    use super::*;

    fn status_of(err: impl Into<DomainError>) -> StatusCode {
        ApiError::Domain(err.into()).into_response().status()
    }

    #[test]
    fn test_business_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(CartError::InvalidQuantity { quantity: 0 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(OrderError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(OrderError::UnknownProduct(ProductId::new("SKU-404"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(OrderError::TotalOverflow), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(InventoryError::InsufficientStock(vec![Shortage {
                product_id: ProductId::new("SKU-001"),
                requested: 6,
                available: 4,
            }])),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrderError::NotFound(OrderId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrderError::Forbidden(OrderId::new())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Paid,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrderError::ConcurrentUpdate(OrderId::new())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_store_failures_are_internal() {
        let err = StoreError::Unavailable("connection reset".to_string());
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);

        let overflow = StoreError::StockOverflow(ProductId::new("SKU-001"));
        assert_eq!(status_of(overflow), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
