//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule failures                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── SaleError        - Sale transaction outcome                       │
//! │                                                                         │
//! │  Server errors (apps/server)                                           │
//! │  └── ApiError         - What HTTP clients see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SaleError → ApiError → Client     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant here is detected before any mutation happens, so returning
/// one of these means nothing was written.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No active item matches the reference.
    ///
    /// ## When This Occurs
    /// - Id, SKU and name all miss
    /// - Item was soft-deleted (inactive)
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// A name reference matched more than one active item.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: { productRef: "cola", quantity: 2 }
    ///      │
    ///      ▼
    /// Resolve: id? no. SKU "COLA"? no. name ~ "cola"? → 2 matches
    ///      │
    ///      ▼
    /// AmbiguousReference { reference: "cola", matches: 2 }
    ///      │
    ///      ▼
    /// Client retries with the SKU
    /// ```
    #[error("Reference '{reference}' matches {matches} items; use the id or SKU")]
    AmbiguousReference { reference: String, matches: usize },

    /// Insufficient stock to complete sale.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale was already cancelled; its stock has already been restored.
    #[error("Sale {0} is already cancelled")]
    AlreadyCancelled(String),

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {slip_number} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        slip_number: String,
        current_status: String,
    },

    /// Sale state machine was asked for a transition it does not allow.
    #[error("Invalid sale transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The sale has no lines.
    #[error("A sale needs at least one product")]
    EmptySale,

    /// Discount is larger than what is being charged.
    #[error("Discount {discount_cents} exceeds subtotal plus tax {charged_cents}")]
    DiscountTooLarge {
        discount_cents: i64,
        charged_cents: i64,
    },
}

impl ValidationError {
    /// Field name this error is about, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => Some(field),
            ValidationError::EmptySale | ValidationError::DiscountTooLarge { .. } => None,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "COLA-330".to_string(),
            available: 1,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COLA-330: available 1, requested 5"
        );

        let err = CoreError::AmbiguousReference {
            reference: "cola".to_string(),
            matches: 2,
        };
        assert_eq!(
            err.to_string(),
            "Reference 'cola' matches 2 items; use the id or SKU"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "productRef".to_string(),
        };
        assert_eq!(err.to_string(), "productRef is required");
        assert_eq!(err.field(), Some("productRef"));

        assert_eq!(
            ValidationError::EmptySale.to_string(),
            "A sale needs at least one product"
        );
        assert_eq!(ValidationError::EmptySale.field(), None);
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::EmptySale;
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
