//! HTTP client for the remote catalog service.
//!
//! Speaks plain JSON over REST:
//!
//! ```text
//! GET    {base}/products        -> [Product]
//! POST   {base}/products        <- ProductInput -> Product
//! PUT    {base}/products/{id}   <- ProductInput -> Product
//! DELETE {base}/products/{id}
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stockroom_core::{Product, ProductId, ProductInput};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::CatalogApiConfig;

use super::{ProductService, ServiceError};

/// Longest error body echoed back when the service sends no structured message.
const MAX_RAW_ERROR_LEN: usize = 200;

/// Client for the catalog REST API.
#[derive(Clone)]
pub struct ProductApiClient {
    inner: Arc<ProductApiClientInner>,
}

struct ProductApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

/// Error payload returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ProductApiClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CatalogApiConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ProductApiClientInner {
                client,
                base_url: config.base_url.clone(),
                token: config.token.clone(),
            }),
        })
    }

    /// Base URL of the catalog service.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, self.url(path))
            .header(ACCEPT, "application/json");

        match &self.inner.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and return the body of a successful response.
    async fn send(
        &self,
        builder: RequestBuilder,
        target: Option<ProductId>,
    ) -> Result<String, ServiceError> {
        let response = builder.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body);
        warn!(status = status.as_u16(), %message, "Catalog request failed");

        Err(match (status, target) {
            (StatusCode::NOT_FOUND, Some(id)) => ServiceError::NotFound(id),
            (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
                ServiceError::Rejected(message)
            }
            _ => ServiceError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        target: Option<ProductId>,
    ) -> Result<T, ServiceError> {
        let body = self.send(builder, target).await?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(body = %body, "Unparseable catalog response");
            ServiceError::Parse(e)
        })
    }
}

/// Extract a readable message from an error body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
    {
        return message;
    }
    body.trim().chars().take(MAX_RAW_ERROR_LEN).collect()
}

#[async_trait]
impl ProductService for ProductApiClient {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Product>, ServiceError> {
        self.send_json(self.request(Method::GET, "products"), None)
            .await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create(&self, input: &ProductInput) -> Result<Product, ServiceError> {
        let builder = self
            .request(Method::POST, "products")
            .header(CONTENT_TYPE, "application/json")
            .json(input);
        self.send_json(builder, None).await
    }

    #[instrument(skip(self, input), fields(product_id = %id))]
    async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, ServiceError> {
        let builder = self
            .request(Method::PUT, &format!("products/{id}"))
            .header(CONTENT_TYPE, "application/json")
            .json(input);
        self.send_json(builder, Some(id)).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
        self.send(self.request(Method::DELETE, &format!("products/{id}")), Some(id))
            .await
            .map(|_| ())
    }
}
