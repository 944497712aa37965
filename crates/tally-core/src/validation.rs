//! # Validation Module
//!
//! Input validation utilities for Tally.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (apps/server)                                   │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── THIS MODULE: field rules (lengths, ranges, formats)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Sale validator (tally-db)                                    │
//! │  ├── Reference resolution against the stock ledger                     │
//! │  └── Combined quantity vs available stock                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── UNIQUE (sku), UNIQUE (slip_number)                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use tally_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("COLA-330").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::sale::SaleLine;
use crate::types::{ItemPatch, NewItem};
use crate::{MAX_LINE_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest page size for list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("COLA-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an item name: required, at most 200 characters.
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Trims an optional free-text field, turning blanks into `None`.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.len() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Loose e-mail shape check: one `@` with text on both sides and a dot
/// in the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "customerEmail".to_string(),
        reason: "must be an e-mail address".to_string(),
    };

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level (zero allowed).
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("priceCents", 1099).is_ok());
/// assert!(validate_price_cents("priceCents", 0).is_ok());
/// assert!(validate_price_cents("priceCents", -100).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates page and limit for list queries. `page` is 1-based.
pub fn validate_pagination(page: u32, limit: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_LIMIT as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates the shape of a sale's product lines, before any lookup.
///
/// ## Rules
/// - At least one line, at most MAX_SALE_LINES
/// - Every line has a product reference
/// - Every quantity passes [`validate_quantity`]
/// - Client prices, when given, are non-negative
pub fn validate_sale_lines(lines: &[SaleLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::EmptySale);
    }

    if lines.len() > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "products".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    for line in lines {
        if line.product_ref.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productRef".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
        if let Some(cents) = line.unit_price_cents {
            validate_price_cents("unitPriceCents", cents)?;
        }
    }

    Ok(())
}

/// Validates a new catalog item.
pub fn validate_new_item(item: &NewItem) -> ValidationResult<()> {
    validate_sku(&item.sku)?;
    validate_item_name(&item.name)?;
    validate_stock_level("quantity", item.quantity)?;
    validate_stock_level("minStockLevel", item.min_stock_level)?;
    if let Some(cents) = item.price_cents {
        validate_price_cents("priceCents", cents)?;
    }
    validate_price_cents("costCents", item.cost_cents)?;
    Ok(())
}

/// Validates the fields present in an item patch.
pub fn validate_item_patch(patch: &ItemPatch) -> ValidationResult<()> {
    if let Some(sku) = &patch.sku {
        validate_sku(sku)?;
    }
    if let Some(name) = &patch.name {
        validate_item_name(name)?;
    }
    if let Some(qty) = patch.quantity {
        validate_stock_level("quantity", qty)?;
    }
    if let Some(level) = patch.min_stock_level {
        validate_stock_level("minStockLevel", level)?;
    }
    if let Some(cents) = patch.price_cents {
        validate_price_cents("priceCents", cents)?;
    }
    if let Some(cents) = patch.cost_cents {
        validate_price_cents("costCents", cents)?;
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Returns true when `id` parses as a UUID.
///
/// ```rust
/// use tally_core::validation::is_uuid;
///
/// assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
/// assert!(!is_uuid("SLP-20260101000000000-ABCDE"));
/// ```
pub fn is_uuid(id: &str) -> bool {
    uuid::Uuid::parse_str(id.trim()).is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("COLA-330").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_item_name() {
        assert!(validate_item_name("Cola 330ml").is_ok());
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("notes", None, 10).unwrap(), None);
        assert_eq!(optional_text("notes", Some("   "), 10).unwrap(), None);
        assert_eq!(
            optional_text("notes", Some(" hi "), 10).unwrap(),
            Some("hi".to_string())
        );
        assert!(optional_text("notes", Some("0123456789x"), 10).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@shop.example").is_ok());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@shop.example").is_err());
        assert!(validate_email("a@localhost").is_err());
    }

    #[test]
    fn test_validate_pagination() {
        assert!(validate_pagination(1, 20).is_ok());
        assert!(validate_pagination(0, 20).is_err());
        assert!(validate_pagination(1, 0).is_err());
        assert!(validate_pagination(1, MAX_PAGE_LIMIT + 1).is_err());
    }

    #[test]
    fn test_validate_sale_lines() {
        assert!(matches!(
            validate_sale_lines(&[]),
            Err(ValidationError::EmptySale)
        ));
        assert!(validate_sale_lines(&[SaleLine::new("A-1", 2)]).is_ok());
        assert!(validate_sale_lines(&[SaleLine::new(" ", 2)]).is_err());
        assert!(validate_sale_lines(&[SaleLine::new("A-1", 0)]).is_err());
        assert!(validate_sale_lines(&[SaleLine::new("A-1", 1).with_price(-1)]).is_err());

        let too_many: Vec<SaleLine> = (0..=MAX_SALE_LINES).map(|_| SaleLine::new("A-1", 1)).collect();
        assert!(validate_sale_lines(&too_many).is_err());
    }

    #[test]
    fn test_validate_new_item() {
        assert!(validate_new_item(&NewItem::new("A-1", "Widget", 5, Some(100))).is_ok());
        assert!(validate_new_item(&NewItem::new("A-1", "Widget", -1, Some(100))).is_err());
        assert!(validate_new_item(&NewItem::new("A-1", "Widget", 5, Some(-1))).is_err());
        assert!(validate_new_item(&NewItem::new("", "Widget", 5, None)).is_err());
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid(""));
        assert!(!is_uuid("not-a-uuid"));
    }
}
