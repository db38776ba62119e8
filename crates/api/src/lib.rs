//! HTTP API server for the commerce core.
//!
//! Exposes carts, orders and the product catalog over REST, with structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{AuthGate, BearerOwnerGate};
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/add", post(routes::cart::add::<S>))
        .route("/cart/remove", post(routes::cart::remove::<S>))
        .route("/cart/update", put(routes::cart::update::<S>))
        .route("/cart/clear", delete(routes::cart::clear::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/cancel", delete(routes::orders::cancel::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S>).put(routes::products::register::<S>),
        )
        .route("/products/{id}/restock", post(routes::products::restock::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: bearer credentials are owner ids.
pub fn create_default_state<S: Store>(store: S) -> Arc<AppState<S>> {
    create_state(store, Arc::new(BearerOwnerGate))
}

/// Creates application state with a custom identity resolver.
pub fn create_state<S: Store>(store: S, auth: Arc<dyn AuthGate>) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, auth))
}
