//! Integration tests for the admin HTTP routes.
//!
//! Requests run against the full router with an in-memory catalog behind it.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use stockroom_admin::{
    catalog::{InMemoryProductService, QueryCache, QueryKey},
    routes::routes,
    state::AppState,
};
use stockroom_integration_tests::peripheral;
use tower::ServiceExt;

fn state(service: &InMemoryProductService) -> AppState {
    AppState::with_service(Arc::new(service.clone()), Duration::from_secs(300))
}

fn app(service: &InMemoryProductService) -> Router {
    routes().with_state(state(service))
}

/// State whose cached list is stale and whose refreshes keep failing.
async fn stale_state(service: &InMemoryProductService) -> AppState {
    let state = state(service);
    state.queries().fetch(QueryKey::Products).await.unwrap();
    for _ in 0..4 {
        service.fail_next("catalog offline").await;
    }
    state.queries().invalidate(QueryKey::Products).await;
    state
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn mouse() -> Value {
    json!({
        "name": "Mouse",
        "category": "Peripherals",
        "price": 49.9,
        "quantity": 10
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app(&InMemoryProductService::new());
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_root_redirects_to_products() {
    let app = app(&InMemoryProductService::new());
    let (status, _) = send(&app, Method::GET, "/", None).await;
    assert!(status.is_redirection());
}

// =============================================================================
// JSON API
// =============================================================================

#[tokio::test]
async fn test_create_returns_created_product() {
    let service = InMemoryProductService::new();
    let app = app(&service);

    let (status, body) = send(&app, Method::POST, "/api/products", Some(mouse())).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(created["id"], 1);
    assert_eq!(created["name"], "Mouse");
    assert_eq!(service.products().await.len(), 1);

    let (status, body) = send(&app, Method::GET, "/api/products?q=periph", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_create_lists_every_violation() {
    let service = InMemoryProductService::new();
    let app = app(&service);
    let input = json!({ "name": "  ", "category": "", "price": 0, "quantity": -1 });

    let (status, body) = send(&app, Method::POST, "/api/products", Some(input)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = serde_json::from_str(&body).unwrap();
    let violations = error["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 4);
    assert_eq!(violations[0]["field"], "name");
    assert_eq!(service.write_calls(), 0);
}

#[tokio::test]
async fn test_update_replaces_fields() {
    let service = InMemoryProductService::with_products(vec![peripheral(3, "Mouse")]);
    let app = app(&service);
    let mut input = mouse();
    input["name"] = json!("Trackball");

    let (status, body) = send(&app, Method::PUT, "/api/products/3", Some(input)).await;
    assert_eq!(status, StatusCode::OK);
    let updated: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(updated["id"], 3);
    assert_eq!(updated["name"], "Trackball");
    assert_eq!(service.products().await[0].name, "Trackball");
}

#[tokio::test]
async fn test_list_serves_stale_products_when_refresh_fails() {
    let service = InMemoryProductService::with_products(vec![peripheral(3, "Mouse")]);
    let app = routes().with_state(stale_state(&service).await);

    let (status, body) = send(&app, Method::GET, "/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listed[0]["name"], "Mouse");
}

#[tokio::test]
async fn test_update_of_temporary_id_is_bad_request() {
    let service = InMemoryProductService::new();
    let app = app(&service);

    let (status, _) = send(&app, Method::PUT, "/api/products/-1", Some(mouse())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(service.write_calls(), 0);
}

#[tokio::test]
async fn test_delete_returns_no_content() {
    let service = InMemoryProductService::with_products(vec![peripheral(3, "Mouse")]);
    let app = app(&service);

    let (status, body) = send(&app, Method::DELETE, "/api/products/3", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert!(service.products().await.is_empty());
}

#[tokio::test]
async fn test_delete_of_unknown_product_is_not_found() {
    let service = InMemoryProductService::with_products(vec![peripheral(3, "Mouse")]);
    let app = app(&service);

    let (status, _) = send(&app, Method::DELETE, "/api/products/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(service.products().await.len(), 1);
}

#[tokio::test]
async fn test_service_failure_is_bad_gateway() {
    let service = InMemoryProductService::with_products(vec![peripheral(3, "Mouse")]);
    let app = app(&service);
    service.fail_next("catalog offline").await;

    let (status, body) = send(&app, Method::DELETE, "/api/products/3", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("catalog offline"));
}

#[tokio::test]
async fn test_notices_record_mutation_outcomes() {
    let service = InMemoryProductService::with_products(vec![peripheral(3, "Mouse")]);
    let app = app(&service);

    send(&app, Method::POST, "/api/products", Some(mouse())).await;
    send(&app, Method::DELETE, "/api/products/42", None).await;

    let (status, body) = send(&app, Method::GET, "/api/notices", None).await;
    assert_eq!(status, StatusCode::OK);
    let notices: Value = serde_json::from_str(&body).unwrap();
    let notices = notices.as_array().unwrap();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0]["level"], "success");
    assert_eq!(notices[0]["message"], "Product created");
    assert_eq!(notices[1]["level"], "error");
}

// =============================================================================
// HTML
// =============================================================================

#[tokio::test]
async fn test_products_page_lists_products() {
    let service = InMemoryProductService::with_products(vec![
        peripheral(1, "Mouse"),
        peripheral(2, "Keyboard"),
    ]);
    let app = app(&service);

    let (status, body) = send(&app, Method::GET, "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Mouse"));
    assert!(body.contains("Keyboard"));
    assert!(body.contains("$25.00"));
    assert!(body.contains("10 units"));
}

#[tokio::test]
async fn test_products_page_empty_states() {
    let empty = app(&InMemoryProductService::new());
    let (_, body) = send(&empty, Method::GET, "/products", None).await;
    assert!(body.contains("No products yet."));

    let stocked = app(&InMemoryProductService::with_products(vec![peripheral(
        1, "Mouse",
    )]));
    let (_, body) = send(&stocked, Method::GET, "/products?q=monitor", None).await;
    assert!(body.contains("No products match your search."));
    assert!(!body.contains(r#"<div class="font-medium">Mouse</div>"#));
}

#[tokio::test]
async fn test_products_page_offers_prefilled_edit() {
    let service = InMemoryProductService::with_products(vec![peripheral(4, "Mouse")]);
    let app = app(&service);

    let (_, body) = send(&app, Method::GET, "/products", None).await;
    assert!(body.contains(r#"class="edit" data-id="4""#));
    assert!(body.contains(r#"data-name="Mouse""#));
    assert!(body.contains(r#"data-price="25.00""#));
    assert!(body.contains("`/api/products/${id}`"));
    assert!(body.contains(r#"method: id ? "PUT" : "POST""#));
}

#[tokio::test]
async fn test_products_page_shows_stale_list_while_refreshing() {
    let service = InMemoryProductService::with_products(vec![peripheral(4, "Mouse")]);
    let app = routes().with_state(stale_state(&service).await);

    let (status, body) = send(&app, Method::GET, "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Refreshing list..."));
    assert!(body.contains(r#"<div class="font-medium">Mouse</div>"#));
    assert!(!body.contains(r#"role="alert""#));
}
