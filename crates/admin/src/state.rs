//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{ProductApiClient, ProductMutations, ProductService, QueryClient, ServiceError};
use crate::config::AdminConfig;
use crate::notify::NoticeBoard;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    queries: QueryClient,
    mutations: ProductMutations,
    notices: Arc<NoticeBoard>,
}

impl AppState {
    /// Build state talking to the catalog service named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &AdminConfig) -> Result<Self, ServiceError> {
        let client = ProductApiClient::new(&config.catalog)?;
        tracing::info!(catalog = %client.base_url(), "Catalog client created");
        Ok(Self::with_service(Arc::new(client), config.cache_ttl))
    }

    /// Build state around any catalog service.
    #[must_use]
    pub fn with_service(service: Arc<dyn ProductService>, cache_ttl: Duration) -> Self {
        let queries = QueryClient::new(Arc::clone(&service), cache_ttl);
        let notices = Arc::new(NoticeBoard::default());
        let mutations = ProductMutations::new(
            service,
            Arc::new(queries.clone()),
            notices.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                queries,
                mutations,
                notices,
            }),
        }
    }

    #[must_use]
    pub fn queries(&self) -> &QueryClient {
        &self.inner.queries
    }

    #[must_use]
    pub fn mutations(&self) -> &ProductMutations {
        &self.inner.mutations
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.inner.notices
    }
}
