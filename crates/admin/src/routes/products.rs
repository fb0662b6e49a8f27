//! Products list route handler.

use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use stockroom_core::{Product, ProductInput, filter_products};
use tracing::instrument;

use crate::{
    catalog::{MutationKind, QueryKey},
    notify::{Notice, NoticeLevel},
    state::AppState,
};

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Product view for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub quantity: i64,
    /// Shown under a temporary id until the service confirms it.
    pub pending: bool,
    /// Raw field values used to prefill the edit form.
    pub edit: ProductInput,
}

/// Notice view for templates.
#[derive(Debug, Clone)]
pub struct NoticeView {
    pub message: String,
    pub class: &'static str,
}

// =============================================================================
// Type Conversions
// =============================================================================

/// Format a price with two decimals.
fn format_price(price: Decimal) -> String {
    format!("${:.2}", price.round_dp(2))
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        let description = if product.description.trim().is_empty() {
            "No description".to_string()
        } else {
            product.description.clone()
        };
        let category = if product.category.trim().is_empty() {
            "N/A".to_string()
        } else {
            product.category.clone()
        };

        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            description,
            category,
            price: format_price(product.price),
            quantity: product.quantity,
            pending: product.id.is_temporary(),
            edit: product.to_input(),
        }
    }
}

impl From<&Notice> for NoticeView {
    fn from(notice: &Notice) -> Self {
        let class = match notice.level {
            NoticeLevel::Success => "bg-green-100 text-green-700",
            NoticeLevel::Error => "bg-red-100 text-red-700",
        };
        Self {
            message: notice.message.clone(),
            class,
        }
    }
}

/// Products list page template.
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub current_path: String,
    pub products: Vec<ProductView>,
    pub search_query: String,
    pub empty_message: &'static str,
    pub refreshing: bool,
    pub load_error: Option<String>,
    pub notices: Vec<NoticeView>,
    pub saving: bool,
    pub deleting: bool,
}

/// Message shown when no rows are listed.
const fn empty_message(searching: bool) -> &'static str {
    if searching {
        "No products match your search."
    } else {
        "No products yet."
    }
}

/// Products list page handler.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Html<String> {
    let search_query = query.q.unwrap_or_default();

    // Serve a stale list straight away and refresh it in the background.
    let queries = state.queries();
    let (products, refreshing, load_error) = match queries.entry(QueryKey::Products).await {
        Some(entry) if entry.stale => {
            queries.refetch_in_background(QueryKey::Products);
            (entry.products.to_vec(), true, None)
        }
        _ => match queries.ensure(QueryKey::Products).await {
            Ok(products) => (products, false, None),
            Err(e) => {
                tracing::error!("Failed to fetch products: {e}");
                let message = e
                    .message()
                    .unwrap_or_else(|| "Could not load products".to_string());
                (vec![], false, Some(message))
            }
        },
    };

    let products: Vec<ProductView> = filter_products(&products, &search_query)
        .into_iter()
        .map(ProductView::from)
        .collect();
    let notices = state.notices().drain().iter().map(NoticeView::from).collect();
    let mutations = state.mutations();

    let template = ProductsIndexTemplate {
        current_path: "/products".to_string(),
        products,
        empty_message: empty_message(!search_query.trim().is_empty()),
        search_query,
        refreshing,
        load_error,
        notices,
        saving: mutations.is_saving(),
        deleting: mutations.is_pending(MutationKind::Delete),
    };

    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}
