//! Integration tests for Stockroom.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockroom-integration-tests
//! ```
//!
//! Everything runs in process: the catalog service is an
//! [`InMemoryProductService`], optionally behind a [`GatedService`] that holds
//! writes until the test releases them so the speculative cache state can be
//! inspected mid-flight.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use stockroom_admin::catalog::{
    InMemoryProductService, ProductMutations, ProductService, QueryCache, QueryClient, QueryKey,
    ServiceError,
};
use stockroom_admin::notify::Notifier;
use stockroom_core::{Product, ProductId, ProductInput};
use tokio::sync::{Notify, Semaphore};

/// Longest a test waits for background work before failing.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a product with the given id.
#[must_use]
pub fn product(id: i32, name: &str, category: &str, price: Decimal, quantity: i64) -> Product {
    Product::from_input(ProductId::new(id), ProductInput::new(name, category, price, quantity))
}

/// `Peripherals` product priced 25.00 with 10 in stock.
#[must_use]
pub fn peripheral(id: i32, name: &str) -> Product {
    product(id, name, "Peripherals", Decimal::new(2500, 2), 10)
}

/// Notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Catalog service whose writes wait for [`GatedService::release`].
///
/// Reads pass straight through.
pub struct GatedService {
    inner: InMemoryProductService,
    gate: Semaphore,
    arrived: AtomicUsize,
    arrival: Notify,
}

impl GatedService {
    #[must_use]
    pub fn new(inner: InMemoryProductService) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            arrived: AtomicUsize::new(0),
            arrival: Notify::new(),
        }
    }

    /// Let `n` held writes proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Wait until `n` writes have reached the service.
    pub async fn wait_for_writes(&self, n: usize) {
        tokio::time::timeout(SETTLE_TIMEOUT, async {
            loop {
                let notified = self.arrival.notified();
                if self.arrived.load(Ordering::SeqCst) >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .unwrap();
    }

    /// Writes that have reached the service so far, held or not.
    #[must_use]
    pub fn writes_arrived(&self) -> usize {
        self.arrived.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        self.arrived.fetch_add(1, Ordering::SeqCst);
        self.arrival.notify_waiters();
        self.gate.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl ProductService for GatedService {
    async fn list(&self) -> Result<Vec<Product>, ServiceError> {
        self.inner.list().await
    }

    async fn create(&self, input: &ProductInput) -> Result<Product, ServiceError> {
        self.pass().await;
        self.inner.create(input).await
    }

    async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, ServiceError> {
        self.pass().await;
        self.inner.update(id, input).await
    }

    async fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
        self.pass().await;
        self.inner.delete(id).await
    }
}

/// Coordinator wired to an in-memory catalog.
pub struct TestContext {
    pub service: InMemoryProductService,
    pub gate: Arc<GatedService>,
    pub queries: QueryClient,
    pub notices: Arc<RecordingNotifier>,
    pub mutations: Arc<ProductMutations>,
}

impl TestContext {
    /// Seed the catalog with `products` and load them into the cache.
    ///
    /// Writes are held at the gate; call `open` for tests that do not
    /// inspect in-flight state.
    pub async fn new(products: Vec<Product>) -> Self {
        let service = InMemoryProductService::with_products(products);
        let gate = Arc::new(GatedService::new(service.clone()));
        let queries = QueryClient::new(gate.clone(), Duration::from_secs(300));
        queries.fetch(QueryKey::Products).await.unwrap();

        let notices = Arc::new(RecordingNotifier::default());
        let mutations = Arc::new(ProductMutations::new(
            gate.clone(),
            Arc::new(queries.clone()),
            notices.clone(),
        ));

        Self {
            service,
            gate,
            queries,
            notices,
            mutations,
        }
    }

    /// Let every write through without holding it.
    #[must_use]
    pub fn open(self) -> Self {
        self.gate.release(Semaphore::MAX_PERMITS / 2);
        self
    }

    /// Current cached list.
    pub async fn cached(&self) -> Vec<Product> {
        self.queries.get(QueryKey::Products).await.unwrap_or_default()
    }

    /// Wait for the background refresh to land and return the fresh list.
    pub async fn refreshed(&self) -> Vec<Product> {
        tokio::time::timeout(SETTLE_TIMEOUT, async {
            loop {
                if let Some(entry) = self.queries.entry(QueryKey::Products).await
                    && !entry.stale
                {
                    return entry.products.to_vec();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }
}
