//! # Sale Module
//!
//! Sale lines, resolved lines, totals and the sale transaction state machine.
//!
//! ## Lifecycle of a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client                                                                 │
//! │    products: [{ productRef, quantity, unitPriceCents? }]  ← SaleLine    │
//! │       │                                                                 │
//! │       ▼   resolve against the stock ledger (tally-db)                   │
//! │  ResolvedLine { item_id, sku, name, quantity, unit_price, line_total } │
//! │       │                                                                 │
//! │       ▼   SaleTotals::from_lines(lines, tax, discount)                  │
//! │  SaleTotals { subtotal, tax, discount, total }                          │
//! │       │                                                                 │
//! │       ▼   coordinator drives SaleState                                  │
//! │  Initiated → Validated → StockReserved → Committed                      │
//! │       └───────────┴──────────────┴────────→ Aborted                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{IncomeEntry, Item, PaymentMethod, Slip};
use crate::TOTAL_TOLERANCE_CENTS;

// =============================================================================
// Sale Line (input)
// =============================================================================

/// One requested product line, as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLine {
    /// Item id, SKU or name.
    pub product_ref: String,
    pub quantity: i64,
    /// Used only when the catalog has no price for the item.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

impl SaleLine {
    pub fn new(product_ref: &str, quantity: i64) -> Self {
        SaleLine {
            product_ref: product_ref.to_string(),
            quantity,
            unit_price_cents: None,
        }
    }

    pub fn with_price(mut self, unit_price_cents: i64) -> Self {
        self.unit_price_cents = Some(unit_price_cents);
        self
    }
}

/// A proposed sale, as submitted by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRequest {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Defaults to Cash.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub notes: Option<String>,
    pub products: Vec<SaleLine>,
    #[serde(default)]
    pub tax_cents: Option<i64>,
    #[serde(default)]
    pub discount_cents: Option<i64>,
    /// What the client computed. A mismatch is logged, never rejected.
    #[serde(default)]
    pub expected_total_cents: Option<i64>,
}

impl SaleRequest {
    pub fn new(products: Vec<SaleLine>) -> Self {
        SaleRequest {
            products,
            ..Default::default()
        }
    }
}

/// A committed sale: the slip and its income entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleReceipt {
    pub slip: Slip,
    pub income_entry: IncomeEntry,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CancelReceipt {
    pub message: String,
    pub slip: Slip,
    /// Id of the income entry that was removed.
    pub removed_income_id: String,
}

// =============================================================================
// Price Source
// =============================================================================

/// Where a resolved line's unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PriceSource {
    /// The item's catalog price.
    Catalog,
    /// The client's price, because the catalog had none.
    Client,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Catalog => f.write_str("catalog"),
            PriceSource::Client => f.write_str("client"),
        }
    }
}

// =============================================================================
// Resolved Line
// =============================================================================

/// A sale line bound to a concrete item with an authoritative price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResolvedLine {
    pub item_id: String,
    /// Snapshot at resolution time.
    pub sku: String,
    /// Snapshot at resolution time.
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub price_source: PriceSource,
    /// quantity × unit_price
    pub line_total: Money,
}

impl ResolvedLine {
    /// Binds a requested quantity to an item.
    ///
    /// ## Price Resolution
    /// ```text
    /// item.price_cents = Some(p)           → p, Catalog (client price ignored)
    /// item.price_cents = None, client = c  → c, Client
    /// item.price_cents = None, client None → ValidationError
    /// ```
    ///
    /// Stock is not checked here; that needs the combined quantity of every
    /// line for the item.
    pub fn resolve(item: &Item, quantity: i64, client_price_cents: Option<i64>) -> CoreResult<Self> {
        let (unit_price, price_source) = match (item.price_cents, client_price_cents) {
            (Some(cents), _) => (Money::from_cents(cents), PriceSource::Catalog),
            (None, Some(cents)) if cents >= 0 => (Money::from_cents(cents), PriceSource::Client),
            (None, Some(_)) => {
                return Err(ValidationError::MustNotBeNegative {
                    field: "unitPriceCents".to_string(),
                }
                .into())
            }
            (None, None) => {
                return Err(ValidationError::InvalidFormat {
                    field: "unitPriceCents".to_string(),
                    reason: format!("{} has no catalog price; a unit price is required", item.sku),
                }
                .into())
            }
        };

        let line_total = unit_price
            .checked_times(quantity)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: crate::MAX_LINE_QUANTITY,
            })?;

        Ok(ResolvedLine {
            item_id: item.id.clone(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            quantity,
            unit_price,
            price_source,
            line_total,
        })
    }
}

/// Sums quantities per item, keeping first-seen order.
///
/// ```rust
/// use tally_core::sale::combined_quantities;
///
/// let lines = vec![("a", 2), ("b", 1), ("a", 3)];
/// let combined = combined_quantities(lines.iter().map(|(id, q)| (*id, *q)));
/// assert_eq!(combined, vec![("a".to_string(), 5), ("b".to_string(), 1)]);
/// ```
pub fn combined_quantities<'a, I>(lines: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut combined: Vec<(String, i64)> = Vec::new();
    for (item_id, quantity) in lines {
        match combined.iter_mut().find(|(id, _)| id == item_id) {
            Some((_, total)) => *total += quantity,
            None => combined.push((item_id.to_string(), quantity)),
        }
    }
    combined
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Monetary summary of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    /// subtotal + tax - discount
    pub total: Money,
}

impl SaleTotals {
    /// Computes the total from its parts.
    ///
    /// Tax and discount must be non-negative, and the discount may not
    /// exceed subtotal plus tax.
    pub fn compute(subtotal: Money, tax: Money, discount: Money) -> Result<Self, ValidationError> {
        if tax.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "taxCents".to_string(),
            });
        }
        if discount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "discountCents".to_string(),
            });
        }

        let charged = subtotal
            .checked_add(tax)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "taxCents".to_string(),
                min: 0,
                max: i64::MAX - subtotal.cents(),
            })?;

        if discount > charged {
            return Err(ValidationError::DiscountTooLarge {
                discount_cents: discount.cents(),
                charged_cents: charged.cents(),
            });
        }

        Ok(SaleTotals {
            subtotal,
            tax,
            discount,
            total: charged - discount,
        })
    }

    /// Sums the line totals, then applies tax and discount.
    pub fn from_lines(lines: &[ResolvedLine], tax: Money, discount: Money) -> Result<Self, ValidationError> {
        let subtotal = lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total))
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "products".to_string(),
                min: 0,
                max: i64::MAX,
            })?;

        Self::compute(subtotal, tax, discount)
    }

    /// True when a client's expected total agrees within one cent.
    pub fn matches_expected(&self, expected: Money) -> bool {
        self.total.within(expected, TOTAL_TOLERANCE_CENTS)
    }
}

// =============================================================================
// Sale State Machine
// =============================================================================

/// States of one sale transaction.
///
/// ```text
/// Initiated ──► Validated ──► StockReserved ──► Committed
///     │             │               │
///     └─────────────┴───────────────┴──────────► Aborted
/// ```
///
/// Committed and Aborted are terminal. A retried request starts a new
/// transaction from Initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SaleState {
    Initiated,
    Validated,
    StockReserved,
    Committed,
    Aborted,
}

impl SaleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleState::Committed | SaleState::Aborted)
    }

    pub fn can_transition_to(&self, next: SaleState) -> bool {
        use SaleState::*;
        matches!(
            (self, next),
            (Initiated, Validated)
                | (Validated, StockReserved)
                | (StockReserved, Committed)
                | (Initiated, Aborted)
                | (Validated, Aborted)
                | (StockReserved, Aborted)
        )
    }

    /// Moves to `next`, or fails without changing state.
    pub fn transition(&mut self, next: SaleState) -> CoreResult<()> {
        if !self.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for SaleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaleState::Initiated => "Initiated",
            SaleState::Validated => "Validated",
            SaleState::StockReserved => "StockReserved",
            SaleState::Committed => "Committed",
            SaleState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Slip Numbers
// =============================================================================

/// Generates a slip number: `SLP-YYYYMMDDHHMMSSmmm-XXXXX`.
///
/// The timestamp part keeps slip numbers time-ordered; the random suffix
/// separates slips created in the same millisecond.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tally_core::sale::generate_slip_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
/// let number = generate_slip_number(at);
/// assert!(number.starts_with("SLP-20260304050607000-"));
/// assert_eq!(number.len(), 4 + 17 + 1 + 5);
/// ```
pub fn generate_slip_number(at: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(5)
        .collect::<String>()
        .to_uppercase();

    format!("SLP-{}-{}", at.format("%Y%m%d%H%M%S%3f"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================
