//! Remote catalog capability.

use async_trait::async_trait;
use stockroom_core::{Product, ProductId, ProductInput};

use super::ServiceError;

/// The authoritative product store.
///
/// Implementations own timeouts and transport concerns; callers never retry.
#[async_trait]
pub trait ProductService: Send + Sync {
    /// Fetch every product.
    async fn list(&self) -> Result<Vec<Product>, ServiceError>;

    /// Persist a new product and return it with its assigned id.
    async fn create(&self, input: &ProductInput) -> Result<Product, ServiceError>;

    /// Replace the fields of an existing product.
    async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, ServiceError>;

    /// Remove a product.
    async fn delete(&self, id: ProductId) -> Result<(), ServiceError>;
}
