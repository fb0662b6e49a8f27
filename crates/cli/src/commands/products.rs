//! Product catalog commands.
//!
//! Every write goes through the same optimistic coordinator the admin server
//! uses, with notices written to the log.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use stockroom_admin::catalog::{
    InMemoryProductService, MutationError, ProductApiClient, ProductMutations, ProductService,
    QueryClient, QueryKey, ServiceError,
};
use stockroom_admin::config::{CatalogApiConfig, ConfigError};
use stockroom_admin::notify::TracingNotifier;
use stockroom_core::{Product, ProductId, ProductInput, filter_products};
use thiserror::Error;

/// Cache lifetime for a CLI run.
const CLI_CACHE_TTL: Duration = Duration::from_secs(60);

/// Errors that can occur during product commands.
#[derive(Debug, Error)]
pub enum ProductCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Mutation(#[from] MutationError),

    #[error("Product not found: {0}")]
    NotFound(i32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Query cache and mutation coordinator over one catalog service.
pub struct Catalog {
    queries: QueryClient,
    mutations: ProductMutations,
}

impl Catalog {
    /// Talk to the catalog service configured in the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid.
    pub fn connect() -> Result<Self, ProductCommandError> {
        dotenvy::dotenv().ok();
        let config = CatalogApiConfig::from_env()?;
        tracing::info!("Using catalog at {}", config.base_url);
        let client = ProductApiClient::new(&config)?;
        Ok(Self::with_service(Arc::new(client)))
    }

    /// Use an in-memory catalog seeded with a few products.
    #[must_use]
    pub fn offline() -> Self {
        tracing::info!("Using offline demo catalog");
        Self::with_service(Arc::new(InMemoryProductService::with_products(demo_products())))
    }

    fn with_service(service: Arc<dyn ProductService>) -> Self {
        let queries = QueryClient::new(Arc::clone(&service), CLI_CACHE_TTL);
        let mutations =
            ProductMutations::new(service, Arc::new(queries.clone()), Arc::new(TracingNotifier));
        Self { queries, mutations }
    }

    async fn find(&self, id: i32) -> Result<Product, ProductCommandError> {
        let products = self.queries.ensure(QueryKey::Products).await?;
        products
            .into_iter()
            .find(|p| p.id == ProductId::new(id))
            .ok_or(ProductCommandError::NotFound(id))
    }
}

/// Fields to change on an existing product.
#[derive(Debug, Default)]
pub struct ProductEdits {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
}

impl ProductEdits {
    /// Overlay the edits on `current`.
    #[must_use]
    pub fn apply(self, current: ProductInput) -> ProductInput {
        ProductInput {
            name: self.name.unwrap_or(current.name),
            description: self.description.unwrap_or(current.description),
            category: self.category.unwrap_or(current.category),
            price: self.price.unwrap_or(current.price),
            quantity: self.quantity.unwrap_or(current.quantity),
        }
    }
}

/// List products matching `search`.
///
/// # Errors
///
/// Returns an error if the list cannot be fetched.
pub async fn list(catalog: &Catalog, search: &str, json: bool) -> Result<(), ProductCommandError> {
    let products = catalog.queries.ensure(QueryKey::Products).await?;
    let matches = filter_products(&products, search);

    #[allow(clippy::print_stdout)]
    {
        if json {
            println!("{}", serde_json::to_string_pretty(&matches)?);
        } else if matches.is_empty() {
            if search.trim().is_empty() {
                println!("No products yet.");
            } else {
                println!("No products match your search.");
            }
        } else {
            for product in matches {
                println!("{}", format_row(product));
            }
        }
    }
    Ok(())
}

/// Create a product.
///
/// # Errors
///
/// Returns an error if the input is invalid or the service rejects it.
pub async fn create(catalog: &Catalog, input: ProductInput) -> Result<(), ProductCommandError> {
    let created = catalog.mutations.create(input).await?;
    tracing::info!("Product created! ID: {}, Name: {}", created.id, created.name);
    Ok(())
}

/// Change fields of product `id`.
///
/// # Errors
///
/// Returns an error if the product does not exist, the result is invalid,
/// or the service rejects it.
pub async fn update(
    catalog: &Catalog,
    id: i32,
    edits: ProductEdits,
) -> Result<(), ProductCommandError> {
    let current = catalog.find(id).await?;
    let input = edits.apply(current.to_input());
    let updated = catalog.mutations.update(current.id, input).await?;
    tracing::info!("Product updated! ID: {}, Name: {}", updated.id, updated.name);
    Ok(())
}

/// Delete product `id`.
///
/// # Errors
///
/// Returns an error if the service fails to delete it.
pub async fn delete(catalog: &Catalog, id: i32) -> Result<(), ProductCommandError> {
    catalog.mutations.delete(ProductId::new(id)).await?;
    tracing::info!("Product removed! ID: {}", id);
    Ok(())
}

fn format_row(product: &Product) -> String {
    format!(
        "{:>5}  {:<30}  {:<16}  {:>10}  {:>5} units",
        product.id.as_i32(),
        product.name,
        if product.category.is_empty() {
            "N/A"
        } else {
            product.category.as_str()
        },
        format!("${:.2}", product.price.round_dp(2)),
        product.quantity
    )
}

fn demo_products() -> Vec<Product> {
    [
        ("Mouse", "Peripherals", Decimal::new(4990, 2), 10),
        ("Mechanical Keyboard", "Peripherals", Decimal::new(12900, 2), 4),
        ("27\" Monitor", "Displays", Decimal::new(32900, 2), 2),
        ("USB-C Cable", "Accessories", Decimal::new(990, 2), 50),
    ]
    .into_iter()
    .zip(1..)
    .map(|((name, category, price, quantity), id)| {
        Product::from_input(ProductId::new(id), ProductInput::new(name, category, price, quantity))
    })
    .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_edits_keep_unspecified_fields() {
        let current = ProductInput::new("Mouse", "Peripherals", Decimal::new(4990, 2), 10)
            .with_description("Wireless");
        let edits = ProductEdits {
            price: Some(Decimal::new(4490, 2)),
            ..ProductEdits::default()
        };

        let updated = edits.apply(current.clone());
        assert_eq!(updated.price, Decimal::new(4490, 2));
        assert_eq!(updated.name, current.name);
        assert_eq!(updated.description, "Wireless");
    }

    #[test]
    fn test_demo_products_have_unique_server_ids() {
        let products = demo_products();
        assert_eq!(products.len(), 4);
        assert!(products.iter().all(|p| !p.id.is_temporary()));
        assert_eq!(products[3].id, ProductId::new(4));
    }

    #[test]
    fn test_format_row() {
        let product = Product::from_input(
            ProductId::new(7),
            ProductInput::new("Mouse", "", Decimal::new(499, 1), 3),
        );
        let row = format_row(&product);
        assert!(row.contains("N/A"));
        assert!(row.contains("$49.90"));
        assert!(row.ends_with("3 units"));
    }

    #[tokio::test]
    async fn test_offline_update_and_delete() {
        let catalog = Catalog::offline();
        let edits = ProductEdits {
            quantity: Some(0),
            ..ProductEdits::default()
        };
        update(&catalog, 1, edits).await.unwrap();
        delete(&catalog, 2).await.unwrap();

        let err = update(&catalog, 99, ProductEdits::default()).await.unwrap_err();
        assert!(matches!(err, ProductCommandError::NotFound(99)));
    }

    #[tokio::test]
    async fn test_offline_create_rejects_invalid_input() {
        let catalog = Catalog::offline();
        let input = ProductInput::new("Mouse", "Peripherals", Decimal::ZERO, 1);
        let err = create(&catalog, input).await.unwrap_err();
        assert_eq!(err.to_string(), "Price must be greater than zero");
    }
}
