//! Client-side cache of the authoritative product list.
//!
//! [`QueryCache`] is the only surface the mutation coordinator touches.
//! [`QueryClient`] implements it on top of `moka` and adds the read path
//! (cache-first, refetch when missing or stale).
//!
//! Reads are tagged with a per-key generation. [`QueryCache::cancel`] bumps
//! the generation so results of reads started earlier are discarded instead
//! of overwriting a speculative write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use stockroom_core::Product;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::{ProductService, ServiceError};

/// Cached resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// The full product list.
    Products,
}

/// Narrow cache interface used by the mutation coordinator.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Current cached value, if any.
    async fn get(&self, key: QueryKey) -> Option<Vec<Product>>;

    /// Replace the cached value.
    async fn set(&self, key: QueryKey, products: Vec<Product>);

    /// Ignore the results of reads for `key` that are still in flight.
    async fn cancel(&self, key: QueryKey);

    /// Mark `key` stale and schedule a refetch.
    async fn invalidate(&self, key: QueryKey);
}

/// A cached list with its freshness.
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub products: Arc<Vec<Product>>,
    pub stale: bool,
    pub updated_at: DateTime<Utc>,
}

/// `moka`-backed query cache for the product list.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryClientInner>,
}

struct QueryClientInner {
    service: Arc<dyn ProductService>,
    cache: Cache<QueryKey, CachedQuery>,
    generations: Mutex<HashMap<QueryKey, u64>>,
}

impl QueryClient {
    /// Create a query client reading from `service`.
    ///
    /// Entries older than `ttl` are dropped and refetched on next read.
    #[must_use]
    pub fn new(service: Arc<dyn ProductService>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(QueryClientInner {
                service,
                cache,
                generations: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Cached entry including freshness metadata.
    pub async fn entry(&self, key: QueryKey) -> Option<CachedQuery> {
        self.inner.cache.get(&key).await
    }

    /// Return cached products, fetching when missing or stale.
    ///
    /// A stale list is still served when the refetch fails.
    ///
    /// # Errors
    ///
    /// Returns the service error if nothing was cached and the fetch failed.
    pub async fn ensure(&self, key: QueryKey) -> Result<Vec<Product>, ServiceError> {
        let cached = self.entry(key).await;
        if let Some(entry) = &cached
            && !entry.stale
        {
            debug!(?key, "Cache hit");
            return Ok(entry.products.to_vec());
        }

        match (self.fetch(key).await, cached) {
            (Ok(products), _) => Ok(products),
            (Err(e), Some(entry)) => {
                warn!(?key, error = %e, "Refetch failed, serving stale products");
                Ok(entry.products.to_vec())
            }
            (Err(e), None) => Err(e),
        }
    }

    /// Fetch `key` from the service and store the result.
    ///
    /// The result is only stored if no cancel happened while the read was in
    /// flight; the fetched list is returned either way.
    ///
    /// # Errors
    ///
    /// Returns the service error; the cached value is left untouched.
    #[instrument(skip(self))]
    pub async fn fetch(&self, key: QueryKey) -> Result<Vec<Product>, ServiceError> {
        let generation = self.generation(key).await;

        let products = match key {
            QueryKey::Products => self.inner.service.list().await?,
        };

        // Compare and store under the generations lock so a cancel cannot
        // slip in between.
        let generations = self.inner.generations.lock().await;
        if generations.get(&key).copied().unwrap_or(0) == generation {
            self.store(key, products.clone(), false).await;
            debug!(?key, count = products.len(), "Stored fetched products");
        } else {
            debug!(?key, "Discarding result of cancelled read");
        }
        drop(generations);
        Ok(products)
    }

    /// Spawn a fetch on the current runtime, logging failures.
    pub fn refetch_in_background(&self, key: QueryKey) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(?key, "No runtime available, refetch deferred to next read");
            return;
        };
        let client = self.clone();
        handle.spawn(async move {
            if let Err(e) = client.fetch(key).await {
                warn!(?key, error = %e, "Background refetch failed");
            }
        });
    }

    async fn generation(&self, key: QueryKey) -> u64 {
        self.inner
            .generations
            .lock()
            .await
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    async fn store(&self, key: QueryKey, products: Vec<Product>, stale: bool) {
        self.inner
            .cache
            .insert(
                key,
                CachedQuery {
                    products: Arc::new(products),
                    stale,
                    updated_at: Utc::now(),
                },
            )
            .await;
    }
}

#[async_trait]
impl QueryCache for QueryClient {
    async fn get(&self, key: QueryKey) -> Option<Vec<Product>> {
        self.entry(key).await.map(|entry| entry.products.to_vec())
    }

    async fn set(&self, key: QueryKey, products: Vec<Product>) {
        let stale = self.entry(key).await.is_some_and(|entry| entry.stale);
        self.store(key, products, stale).await;
    }

    async fn cancel(&self, key: QueryKey) {
        let mut generations = self.inner.generations.lock().await;
        *generations.entry(key).or_insert(0) += 1;
    }

    async fn invalidate(&self, key: QueryKey) {
        if let Some(entry) = self.entry(key).await {
            self.inner
                .cache
                .insert(
                    key,
                    CachedQuery {
                        stale: true,
                        ..entry
                    },
                )
                .await;
        }
        self.refetch_in_background(key);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use stockroom_core::{ProductId, ProductInput};
    use tokio::sync::Notify;

    use super::*;
    use crate::catalog::InMemoryProductService;

    fn product(id: i32, name: &str) -> Product {
        Product::from_input(
            ProductId::new(id),
            ProductInput::new(name, "Peripherals", Decimal::ONE, 1),
        )
    }

    fn client(service: &InMemoryProductService) -> QueryClient {
        QueryClient::new(Arc::new(service.clone()), Duration::from_secs(300))
    }

    /// Service whose `list` waits for `release` after signalling `entered`.
    struct HeldList {
        inner: InMemoryProductService,
        entered: Notify,
        release: Notify,
    }

    impl HeldList {
        fn new(products: Vec<Product>) -> Self {
            Self {
                inner: InMemoryProductService::with_products(products),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ProductService for HeldList {
        async fn list(&self) -> Result<Vec<Product>, ServiceError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.list().await
        }

        async fn create(&self, input: &ProductInput) -> Result<Product, ServiceError> {
            self.inner.create(input).await
        }

        async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, ServiceError> {
            self.inner.update(id, input).await
        }

        async fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_ensure_fetches_once_then_hits_cache() {
        let service = InMemoryProductService::with_products(vec![product(1, "Mouse")]);
        let queries = client(&service);
        assert!(queries.get(QueryKey::Products).await.is_none());

        let first = queries.ensure(QueryKey::Products).await.unwrap();
        assert_eq!(first.len(), 1);

        // A failure would surface if ensure went back to the service.
        service.fail_next("should not be called").await;
        let second = queries.ensure(QueryKey::Products).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_set_replaces_value_and_keeps_freshness() {
        let service = InMemoryProductService::new();
        let queries = client(&service);
        queries.fetch(QueryKey::Products).await.unwrap();

        queries
            .set(QueryKey::Products, vec![product(-1, "Speculative")])
            .await;
        let entry = queries.entry(QueryKey::Products).await.unwrap();
        assert!(!entry.stale);
        assert_eq!(entry.products.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_in_flight_read() {
        let service = Arc::new(HeldList::new(vec![product(1, "Mouse")]));
        let queries = QueryClient::new(service.clone(), Duration::from_secs(300));

        let reader = {
            let queries = queries.clone();
            tokio::spawn(async move { queries.fetch(QueryKey::Products).await })
        };
        service.entered.notified().await;

        queries.cancel(QueryKey::Products).await;
        queries
            .set(QueryKey::Products, vec![product(-1, "Speculative")])
            .await;
        service.release.notify_one();

        // The caller still gets the server list; the cache keeps the write.
        let read = reader.await.unwrap().unwrap();
        assert_eq!(read[0].id, ProductId::new(1));
        let cached = queries.get(QueryKey::Products).await.unwrap();
        assert_eq!(cached, vec![product(-1, "Speculative")]);
    }

    #[tokio::test]
    async fn test_fetch_after_cancel_still_stores() {
        let service = InMemoryProductService::with_products(vec![product(1, "Mouse")]);
        let queries = client(&service);
        queries.cancel(QueryKey::Products).await;

        queries.fetch(QueryKey::Products).await.unwrap();
        assert_eq!(queries.get(QueryKey::Products).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_marks_stale_and_ensure_refetches() {
        let service = InMemoryProductService::with_products(vec![product(1, "Mouse")]);
        let queries = client(&service);
        queries.fetch(QueryKey::Products).await.unwrap();

        service
            .create(&ProductInput::new("Keyboard", "Peripherals", Decimal::ONE, 1))
            .await
            .unwrap();
        queries.invalidate(QueryKey::Products).await;

        let refreshed = queries.ensure(QueryKey::Products).await.unwrap();
        assert_eq!(refreshed.len(), 2);
        assert!(!queries.entry(QueryKey::Products).await.unwrap().stale);
    }

    #[tokio::test]
    async fn test_ensure_serves_stale_list_when_refetch_fails() {
        let service = InMemoryProductService::with_products(vec![product(1, "Mouse")]);
        let queries = client(&service);
        queries.fetch(QueryKey::Products).await.unwrap();

        // One failure for the background refetch, one for `ensure`.
        service.fail_next("offline").await;
        service.fail_next("offline").await;
        queries.invalidate(QueryKey::Products).await;

        let products = queries.ensure(QueryKey::Products).await.unwrap();
        assert_eq!(products, vec![product(1, "Mouse")]);
        assert!(queries.entry(QueryKey::Products).await.unwrap().stale);
    }

    #[tokio::test]
    async fn test_ensure_without_cache_reports_failure() {
        let service = InMemoryProductService::with_products(vec![product(1, "Mouse")]);
        let queries = client(&service);

        service.fail_next("offline").await;
        assert!(queries.ensure(QueryKey::Products).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_untouched() {
        let service = InMemoryProductService::with_products(vec![product(1, "Mouse")]);
        let queries = client(&service);
        queries.fetch(QueryKey::Products).await.unwrap();

        service.fail_next("offline").await;
        assert!(queries.fetch(QueryKey::Products).await.is_err());
        assert_eq!(queries.get(QueryKey::Products).await.unwrap().len(), 1);
    }
}
