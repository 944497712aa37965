//! # Sale Validator
//!
//! Turns a client's product lines into resolved lines, or rejects the
//! whole sale. Reads only; nothing is written here.
//!
//! ```text
//! [SaleLine] ──► shape checks (tally-core::validation)
//!            ──► resolve each reference (StockLedger::resolve)
//!            ──► price each line (catalog first, client fallback)
//!            ──► combined quantity per item ≤ quantity on hand
//!            ──► [ResolvedLine]
//! ```
//!
//! The stock check here is advisory: it gives a precise error before any
//! transaction starts. The conditional decrement in the stock ledger is
//! what actually prevents overselling.

use tracing::{debug, warn};

use crate::error::SaleResult;
use crate::stock::StockLedger;
use tally_core::sale::{combined_quantities, PriceSource, ResolvedLine, SaleLine};
use tally_core::validation::validate_sale_lines;
use tally_core::CoreError;

/// Resolves and checks sale lines against the stock ledger.
#[derive(Debug, Clone)]
pub struct SaleValidator {
    stock: StockLedger,
}

impl SaleValidator {
    /// Creates a new SaleValidator.
    pub fn new(stock: StockLedger) -> Self {
        SaleValidator { stock }
    }

    /// Validates `lines`, returning them resolved in the same order.
    ///
    /// ## Errors
    /// * `Validation` - empty list, bad quantity, missing price
    /// * `ItemNotFound` / `AmbiguousReference` - unresolvable reference
    /// * `InsufficientStock` - combined request exceeds stock on hand
    pub async fn validate(&self, lines: &[SaleLine]) -> SaleResult<Vec<ResolvedLine>> {
        validate_sale_lines(lines)?;

        let mut resolved = Vec::with_capacity(lines.len());
        let mut on_hand: Vec<(String, i64)> = Vec::new();

        for line in lines {
            let item = self.stock.resolve(&line.product_ref).await?;
            let resolved_line = ResolvedLine::resolve(&item, line.quantity, line.unit_price_cents)?;

            if resolved_line.price_source == PriceSource::Client {
                warn!(
                    sku = %item.sku,
                    unit_price_cents = resolved_line.unit_price.cents(),
                    "Item has no catalog price; using client price"
                );
            }

            if !on_hand.iter().any(|(id, _)| id == &item.id) {
                on_hand.push((item.id.clone(), item.quantity));
            }
            resolved.push(resolved_line);
        }

        let combined = combined_quantities(resolved.iter().map(|l| (l.item_id.as_str(), l.quantity)));
        for (item_id, requested) in combined {
            let available = on_hand
                .iter()
                .find(|(id, _)| *id == item_id)
                .map(|(_, qty)| *qty)
                .unwrap_or(0);

            if requested > available {
                let product = resolved
                    .iter()
                    .find(|l| l.item_id == item_id)
                    .map(|l| l.name.clone())
                    .unwrap_or(item_id);
                return Err(CoreError::InsufficientStock {
                    product,
                    available,
                    requested,
                }
                .into());
            }
        }

        debug!(lines = resolved.len(), "Sale lines validated");
        Ok(resolved)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
