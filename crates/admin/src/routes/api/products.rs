//! Products JSON API handlers.
//!
//! Writes go through the optimistic mutation coordinator, so the cached list
//! served by `GET` reflects them immediately.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use stockroom_core::{Product, ProductId, ProductInput, filter_products, violations};
use tracing::instrument;

use crate::{
    catalog::{MutationError, QueryKey},
    error::AppError,
    notify::Notice,
    routes::products::SearchQuery,
    state::AppState,
};

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route("/api/products/{id}", put(update).delete(delete))
        .route("/api/notices", get(notices))
}

/// Turn a coordinator error into a response, listing every violated rule
/// for invalid input.
fn reject(error: MutationError, input: &ProductInput) -> AppError {
    match error {
        MutationError::Validation(_) => AppError::Invalid(violations(input)),
        remote @ MutationError::Remote { .. } => AppError::Mutation(remote),
    }
}

/// Ids below zero belong to products whose create has not settled.
fn target(id: i32) -> Result<ProductId, AppError> {
    let id = ProductId::new(id);
    if id.is_temporary() {
        return Err(AppError::BadRequest(format!(
            "product {id} is still being created"
        )));
    }
    Ok(id)
}

/// List cached products, optionally filtered by `q`.
///
/// # Errors
///
/// Returns an error if the list had to be fetched and the fetch failed.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.queries().ensure(QueryKey::Products).await?;
    let term = query.q.unwrap_or_default();
    Ok(Json(
        filter_products(&products, &term).into_iter().cloned().collect(),
    ))
}

/// Create a product.
///
/// # Errors
///
/// Returns 422 for invalid input, 502 if the catalog service fails.
#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let created = state
        .mutations()
        .create(input.clone())
        .await
        .map_err(|e| reject(e, &input))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a product.
///
/// # Errors
///
/// Returns 422 for invalid input, 404 if the product is gone, 502 if the
/// catalog service fails.
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    let id = target(id)?;
    let updated = state
        .mutations()
        .update(id, input.clone())
        .await
        .map_err(|e| reject(e, &input))?;
    Ok(Json(updated))
}

/// Delete a product.
///
/// # Errors
///
/// Returns 404 if the product is gone, 502 if the catalog service fails.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let id = target(id)?;
    state.mutations().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Recent notices, oldest first.
pub async fn notices(State(state): State<AppState>) -> Json<Vec<Notice>> {
    Json(state.notices().recent())
}
