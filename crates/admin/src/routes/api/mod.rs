//! API route handlers for admin.
//!
//! JSON API endpoints for catalog operations.

pub mod products;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new().merge(products::router())
}
