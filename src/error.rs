//! Market error types with HTTP status code mapping.
//!
//! [`MarketError`] is the central error type for services and handlers.
//! Each variant maps to a specific HTTP status code and structured JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ContentId, ContentKind};
use crate::persistence::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "script 1742 not found",
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

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                     |
/// |-----------|-----------------------|---------------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request                 |
/// | 2000–2999 | State / Not Found     | 403 / 404 / 409                 |
/// | 3000–3999 | Server                | 500 / 503                       |
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// No table of the kind holds the id, or it is not in the expected one.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Content kind searched.
        kind: ContentKind,
        /// Missing id.
        id: ContentId,
    },

    /// The user has no entry in the giveaway.
    #[error("no entry by user {user_id} in giveaway {giveaway_id}")]
    EntryNotFound {
        /// Giveaway searched.
        giveaway_id: ContentId,
        /// User searched.
        user_id: String,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller does not own the item.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The user already entered this giveaway.
    #[error("user {user_id} already entered giveaway {giveaway_id}")]
    DuplicateEntry {
        /// Entered giveaway.
        giveaway_id: ContentId,
        /// Repeating user.
        user_id: String,
    },

    /// A write collided with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The database kept refusing connections after every retry.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotFound { .. } | Self::EntryNotFound { .. } => 2001,
            Self::DuplicateEntry { .. } => 2002,
            Self::Conflict(_) => 2003,
            Self::Forbidden(_) => 2004,
            Self::Persistence(_) => 3001,
            Self::Unavailable(_) => 3002,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::EntryNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DuplicateEntry { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConnectionLimit(msg) => Self::Unavailable(msg),
            StoreError::UniqueViolation(msg) | StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::EntriesFull(msg) => Self::InvalidRequest(msg),
            StoreError::Database(msg) => Self::Persistence(msg),
        }
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
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
