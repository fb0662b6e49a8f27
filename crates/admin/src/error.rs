//! Unified error handling for admin.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use stockroom_core::ValidationError;
use thiserror::Error;

use crate::catalog::{MutationError, ServiceError};

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed validation; carries every violated rule.
    #[error("Invalid product: {}", first_message(.0))]
    Invalid(Vec<ValidationError>),

    /// A catalog mutation failed.
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Reading from the catalog service failed.
    #[error("Catalog error: {0}")]
    Service(#[from] ServiceError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<ValidationError>,
}

fn first_message(errors: &[ValidationError]) -> &'static str {
    errors.first().map_or("no rules violated", |e| e.message)
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_)
            | Self::Mutation(MutationError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Mutation(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Service(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Mutation(MutationError::Remote { .. }) | Self::Service(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the admin.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Invalid(errors) => first_message(errors).to_string(),
            Self::Mutation(e) => e.to_string(),
            Self::Service(e) => e
                .message()
                .unwrap_or_else(|| "Catalog service error".to_string()),
            Self::BadRequest(_) => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log upstream errors with Sentry
        if status == StatusCode::BAD_GATEWAY {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let violations = match &self {
            Self::Invalid(errors) => errors.clone(),
            Self::Mutation(MutationError::Validation(error)) => vec![error.clone()],
            _ => Vec::new(),
        };
        let body = ErrorBody {
            error: self.public_message(),
            violations,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use stockroom_core::{ProductId, ProductInput, violations};

    use super::*;
    use crate::catalog::MutationKind;

    fn remote(source: ServiceError) -> AppError {
        AppError::Mutation(MutationError::Remote {
            kind: MutationKind::Delete,
            message: source
                .message()
                .unwrap_or_else(|| MutationKind::Delete.failure_message().to_string()),
            source,
        })
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid id".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid id");

        let input = ProductInput::new("", "", Decimal::ZERO, -1);
        let err = AppError::Invalid(violations(&input));
        assert_eq!(err.to_string(), "Invalid product: Product name is required");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        let input = ProductInput::new("Mouse", "Peripherals", Decimal::NEGATIVE_ONE, 1);
        assert_eq!(
            get_status(AppError::Invalid(violations(&input))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(remote(ServiceError::NotFound(ProductId::new(7)))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(remote(ServiceError::Unavailable("down".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_public_message_falls_back_to_generic() {
        let err = remote(ServiceError::Status {
            status: 500,
            message: String::new(),
        });
        assert_eq!(err.public_message(), "Failed to delete product");
    }
}
