//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally                                  │
//! │                                                                         │
//! │  Handler  Result<Json<T>, ApiError>                                     │
//! │     │                                                                   │
//! │     ├── ValidationError ─────────────────────► 400 ValidationError      │
//! │     ├── CoreError::InsufficientStock ────────► 400 + productName,       │
//! │     │                                              available, requested │
//! │     ├── ItemNotFound / SaleNotFound / NotFound ► 404 NotFound           │
//! │     ├── AmbiguousReference ──────────────────► 409                      │
//! │     ├── AlreadyCancelled / InvalidSaleStatus ► 409                      │
//! │     ├── DbError::UniqueViolation ────────────► 409 Conflict             │
//! │     ├── SaleError::TimedOut, DbError::Busy ──► 503                      │
//! │     ├── SaleError::PartialCommitFailure ─────► 500 + details            │
//! │     └── anything else ───────────────────────► 500 DatabaseError        │
//! │                                                   (logged, generic text)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Body
//! ```json
//! {
//!   "error": "InsufficientStock",
//!   "message": "Insufficient stock for Apple: 5 available, 6 requested",
//!   "productName": "Apple",
//!   "available": 5,
//!   "requested": 6
//! }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tally_core::{CoreError, ValidationError};
use tally_db::{DbError, SaleError};

/// Stable, machine-readable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Not enough stock for a line (400)
    InsufficientStock,

    /// Resource not found (404)
    NotFound,

    /// Product reference matched several items (409)
    AmbiguousReference,

    /// Sale was cancelled before (409)
    AlreadyCancelled,

    /// Sale is not in a state that allows the operation (409)
    InvalidSaleStatus,

    /// Duplicate key (409)
    Conflict,

    /// Atomicity could not be confirmed (500)
    PartialCommitFailure,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,

    /// Database busy or unit of work timed out (503)
    Unavailable,
}

/// Error returned from HTTP handlers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,

    #[serde(rename = "error")]
    pub code: ErrorCode,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            field: None,
            product_name: None,
            available: None,
            requested: None,
            details: None,
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let field = err.field().map(str::to_string);
        let mut api = ApiError::validation(err.to_string());
        api.field = field;
        api
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => e.into(),
            CoreError::ItemNotFound(reference) => ApiError::not_found("Product", &reference),
            CoreError::SaleNotFound(reference) => ApiError::not_found("Sale", &reference),
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => {
                let mut api = ApiError::new(
                    StatusCode::BAD_REQUEST,
                    ErrorCode::InsufficientStock,
                    format!(
                        "Insufficient stock for {}: {} available, {} requested",
                        product, available, requested
                    ),
                );
                api.product_name = Some(product);
                api.available = Some(available);
                api.requested = Some(requested);
                api
            }
            e @ CoreError::AmbiguousReference { .. } => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::AmbiguousReference, e.to_string())
            }
            e @ CoreError::AlreadyCancelled(_) => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::AlreadyCancelled, e.to_string())
            }
            e @ CoreError::InvalidSaleStatus { .. } => {
                ApiError::new(StatusCode::CONFLICT, ErrorCode::InvalidSaleStatus, e.to_string())
            }
            e @ CoreError::InvalidTransition { .. } => {
                tracing::error!(error = %e, "Sale state machine violated");
                ApiError::internal("Internal error")
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                StatusCode::CONFLICT,
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::InvalidState { entity, id, reason } => ApiError::new(
                StatusCode::CONFLICT,
                ErrorCode::Conflict,
                format!("{} {}: {}", entity, id, reason),
            ),
            DbError::CheckViolation { message } => {
                tracing::warn!("Check constraint rejected write: {}", message);
                ApiError::validation("Value violates a data constraint")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::Unavailable,
                    "Database is busy, retry shortly",
                )
            }
            DbError::PoolExhausted | DbError::ConnectionFailed(_) => {
                tracing::error!(error = %err, "Database unavailable");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::Unavailable,
                    "Database unavailable",
                )
            }
            DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_) => {
                // Log the actual error but return a generic message
                tracing::error!(error = %err, "Database operation failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DatabaseError,
                    "Database operation failed",
                )
            }
        }
    }
}

impl From<SaleError> for ApiError {
    fn from(err: SaleError) -> Self {
        match err {
            SaleError::Rejected(e) => e.into(),
            SaleError::Database(e) => e.into(),
            SaleError::TimedOut { operation, timeout_ms } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::Unavailable,
                format!("{} did not finish within {} ms and was rolled back", operation, timeout_ms),
            ),
            SaleError::PartialCommitFailure {
                slip_number,
                details,
                ..
            } => {
                // Already logged with item context by the coordinator
                let mut api = ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::PartialCommitFailure,
                    format!("Sale {} may be partially applied; manual reconciliation required", slip_number),
                );
                api.details = Some(details);
                api
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}
