//! In-process catalog service.
//!
//! Behaves like the remote service (server-side validation, id assignment,
//! not-found errors) and can be told to fail upcoming calls. Used for local
//! development and tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use stockroom_core::{Product, ProductId, ProductInput, validate};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ProductService, ServiceError};

/// Catalog held in memory.
///
/// Clone-friendly (cloning shares the same underlying storage).
#[derive(Clone, Default)]
pub struct InMemoryProductService {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    writes: AtomicUsize,
}

#[derive(Default)]
struct State {
    products: Vec<Product>,
    last_id: i32,
    failures: VecDeque<String>,
}

impl InMemoryProductService {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog seeded with `products`.
    ///
    /// New ids continue after the highest seeded id.
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        let last_id = products
            .iter()
            .map(|p| p.id.as_i32())
            .max()
            .unwrap_or(0)
            .max(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    products,
                    last_id,
                    failures: VecDeque::new(),
                }),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next call (of any kind) fail with `message`.
    ///
    /// Calls queue up: each one consumes one pending failure.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.inner
            .state
            .lock()
            .await
            .failures
            .push_back(message.into());
    }

    /// Current contents, in insertion order.
    pub async fn products(&self) -> Vec<Product> {
        self.inner.state.lock().await.products.clone()
    }

    /// Number of create/update/delete calls received, failed or not.
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl State {
    fn take_failure(&mut self) -> Result<(), ServiceError> {
        match self.failures.pop_front() {
            Some(message) => Err(ServiceError::Unavailable(message)),
            None => Ok(()),
        }
    }

    fn position(&self, id: ProductId) -> Result<usize, ServiceError> {
        self.products
            .iter()
            .position(|p| p.id == id)
            .ok_or(ServiceError::NotFound(id))
    }
}

#[async_trait]
impl ProductService for InMemoryProductService {
    async fn list(&self) -> Result<Vec<Product>, ServiceError> {
        let mut state = self.inner.state.lock().await;
        state.take_failure()?;
        Ok(state.products.clone())
    }

    async fn create(&self, input: &ProductInput) -> Result<Product, ServiceError> {
        self.record_write();
        let mut state = self.inner.state.lock().await;
        state.take_failure()?;
        validate(input).map_err(|e| ServiceError::Rejected(e.to_string()))?;

        state.last_id += 1;
        let product = Product::from_input(ProductId::new(state.last_id), input.clone());
        state.products.push(product.clone());
        debug!(product_id = %product.id, "Stored product");
        Ok(product)
    }

    async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, ServiceError> {
        self.record_write();
        let mut state = self.inner.state.lock().await;
        state.take_failure()?;
        let index = state.position(id)?;
        validate(input).map_err(|e| ServiceError::Rejected(e.to_string()))?;

        let product = Product::from_input(id, input.clone());
        if let Some(slot) = state.products.get_mut(index) {
            *slot = product.clone();
        }
        Ok(product)
    }

    async fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
        self.record_write();
        let mut state = self.inner.state.lock().await;
        state.take_failure()?;
        let index = state.position(id)?;
        state.products.remove(index);
        Ok(())
    }
}
