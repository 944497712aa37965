//! # tally-core: Pure Business Logic for Tally
//!
//! This crate is the **heart** of Tally. It contains the sale arithmetic,
//! the sale transaction state machine and all input validation as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP API (apps/server)                       │   │
//! │  │    POST /api/sales, DELETE /api/sales/{id}, GET /api/income    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   sale    │  │ validation│  │   │
//! │  │   │   Item    │  │   Money   │  │ SalePlan  │  │   rules   │  │   │
//! │  │   │   Slip    │  │  totals   │  │ SaleState │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tally-db (Stock Ledger, Slips, Income, Coordinator)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, Slip, IncomeEntry, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`sale`] - Sale lines, resolved lines, totals and the transaction state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`analytics`] - Dashboard and sales trend aggregates
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::sale::SaleTotals;
//!
//! let subtotal = Money::from_cents(2500);
//! let totals = SaleTotals::compute(subtotal, Money::from_cents(100), Money::from_cents(50)).unwrap();
//! assert_eq!(totals.total.cents(), 2550);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod error;
pub mod money;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use analytics::{Dashboard, DashboardSummary, PaymentBreakdown, RecentSale, SalesTrends, TrendPeriod, TrendPoint};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use sale::{
    CancelReceipt, PriceSource, ResolvedLine, SaleLine, SaleReceipt, SaleRequest, SaleState,
    SaleTotals,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single sale.
///
/// ## Business Reason
/// Prevents runaway requests and keeps the transaction unit small.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches typing slips (10000 instead of 10) before stock is touched.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Default low-stock threshold for new items.
pub const DEFAULT_MIN_STOCK_LEVEL: i64 = 10;

/// Allowed drift between a client's expected total and the computed total.
///
/// One cent. A larger drift is logged as a warning, never rejected.
pub const TOTAL_TOLERANCE_CENTS: i64 = 1;
