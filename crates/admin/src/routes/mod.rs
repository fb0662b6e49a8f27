//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Health check
//! GET    /                     - Redirect to /products
//!
//! # Products (HTML)
//! GET    /products?q=          - Product listing with search
//!
//! # Products (JSON, optimistic)
//! GET    /api/products?q=      - Cached product list
//! POST   /api/products         - Create product
//! PUT    /api/products/{id}    - Replace product
//! DELETE /api/products/{id}    - Delete product
//! GET    /api/notices          - Recent success/error notices
//! ```

pub mod api;
pub mod products;

use axum::{Router, response::Redirect, routing::get};

use crate::state::AppState;

/// Build every admin route.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/", get(|| async { Redirect::to("/products") }))
        .route("/products", get(products::index))
        .merge(api::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the catalog service.
async fn health() -> &'static str {
    "ok"
}
