//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type. Cycle failures, setup failures,
//! and API errors all end up here; each variant maps to a numeric code and an
//! HTTP status and renders as a structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::InstanceId;
use crate::pipeline::delivery::DeliveryFailed;
use crate::source::SourceError;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "payload too large: 2300 bytes exceeds the 2048 byte limit; ...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Relay error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                  |
/// |-----------|-------------------|------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request              |
/// | 2000–2999 | State/Not Found   | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server / Upstream | 500 / 502 / 503              |
/// | 4000–4999 | Payload           | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No instance is registered under the given id.
    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// Instance configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed request outside the configuration itself.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Another instance already pushes to this webhook.
    #[error("webhook {0} is already configured")]
    AlreadyConfigured(String),

    /// Serialized payload exceeds the webhook's size limit.
    #[error(
        "payload too large: {actual} bytes exceeds the {limit} byte limit; \
         reduce the number of entities or set history_points to 0"
    )]
    OversizedPayload {
        /// Serialized size in bytes.
        actual: usize,
        /// Allowed maximum in bytes.
        limit: usize,
    },

    /// The state source could not be reached.
    #[error("state source unavailable: {0}")]
    StateUnavailable(#[from] SourceError),

    /// Webhook delivery failed after all attempts.
    #[error(transparent)]
    Delivery(#[from] DeliveryFailed),

    /// Payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connectivity test against the webhook failed during setup.
    #[error("cannot connect to webhook: {0}")]
    SetupValidation(String),

    /// The initial refresh failed; the instance was not registered.
    #[error("instance not ready: {0}")]
    NotReady(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::InstanceNotFound(_) => 2001,
            Self::AlreadyConfigured(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Serialization(_) => 3001,
            Self::StateUnavailable(_) => 3002,
            Self::Delivery(_) => 3003,
            Self::SetupValidation(_) => 3004,
            Self::NotReady(_) => 3005,
            Self::OversizedPayload { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InstanceNotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyConfigured(_) => StatusCode::CONFLICT,
            Self::OversizedPayload { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::StateUnavailable(_) | Self::Delivery(_) | Self::SetupValidation(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
