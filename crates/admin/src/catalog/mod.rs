//! Product catalog access with optimistic local updates.
//!
//! # Architecture
//!
//! - [`ProductService`] is the remote catalog (list/create/update/delete).
//!   [`ProductApiClient`] talks to it over HTTP; [`InMemoryProductService`]
//!   keeps it in process.
//! - [`QueryClient`] caches the authoritative product list in `moka` and
//!   exposes the narrow [`QueryCache`] interface (get/set/cancel/invalidate).
//! - [`ProductMutations`] applies creates, updates and deletes to the cache
//!   before the remote call resolves, then keeps, replaces or rolls back the
//!   speculative change and asks the cache to refresh.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockroom_admin::catalog::{ProductApiClient, ProductMutations, QueryClient};
//! use stockroom_admin::notify::TracingNotifier;
//!
//! let service = Arc::new(ProductApiClient::new(&config.catalog)?);
//! let queries = QueryClient::new(service.clone(), config.cache_ttl);
//! let mutations = ProductMutations::new(service, Arc::new(queries.clone()), Arc::new(TracingNotifier));
//!
//! let created = mutations.create(input).await?;
//! ```

mod client;
mod coordinator;
mod locks;
mod memory;
mod mutation;
mod query;
mod service;

pub use client::ProductApiClient;
pub use coordinator::{MutationError, PendingMutation, ProductMutations};
pub use locks::{KeyGuard, KeyedLocks};
pub use memory::InMemoryProductService;
pub use mutation::{MutationKind, MutationState, MutationStatus};
pub use query::{CachedQuery, QueryCache, QueryClient, QueryKey};
pub use service::ProductService;

use stockroom_core::ProductId;
use thiserror::Error;

/// Errors returned by the remote catalog service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The product does not exist (stale id).
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// The service refused the input.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Any other non-success response.
    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Message suitable for showing to an admin, if the error carries one.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let message = match self {
            Self::Http(err) => err.to_string(),
            Self::NotFound(id) => format!("Product {id} no longer exists"),
            Self::Rejected(message) | Self::Unavailable(message) => message.clone(),
            Self::Status { message, .. } => message.clone(),
            Self::Parse(_) => return None,
        };
        let trimmed = message.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Whether this error means the target record is gone.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::NotFound(ProductId::new(7));
        assert_eq!(err.to_string(), "Product not found: 7");

        let err = ServiceError::Status {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status 503: maintenance");
    }

    #[test]
    fn test_message_falls_back_to_none_when_blank() {
        assert_eq!(ServiceError::Rejected("  ".to_string()).message(), None);
        assert_eq!(
            ServiceError::Status {
                status: 500,
                message: String::new()
            }
            .message(),
            None
        );
    }

    #[test]
    fn test_message_uses_error_text() {
        let err = ServiceError::Rejected("name already taken".to_string());
        assert_eq!(err.message().as_deref(), Some("name already taken"));
        assert_eq!(
            ServiceError::NotFound(ProductId::new(3)).message().as_deref(),
            Some("Product 3 no longer exists")
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(ServiceError::NotFound(ProductId::new(1)).is_not_found());
        assert!(!ServiceError::Unavailable("down".to_string()).is_not_found());
    }
}
