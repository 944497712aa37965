//! # Sale Transaction Coordinator
//!
//! Runs a sale (or its cancellation) as one all-or-nothing unit of work.
//!
//! ## create_sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Initiated                                                              │
//! │     │  SaleValidator::validate + totals      (pool reads, no writes)    │
//! │     ▼                                                                   │
//! │  Validated ────────────── reject ──────────────────────────► Aborted    │
//! │     │  BEGIN                                                            │
//! │     │  StockLedger::reserve per line         (conditional decrement)    │
//! │     ▼                                                                   │
//! │  StockReserved ─────── any line short ─► release + ROLLBACK ► Aborted   │
//! │     │  INSERT slip + slip_lines                                         │
//! │     │  INSERT income entry (slip_number back-reference)                 │
//! │     │  COMMIT                                                           │
//! │     ▼                                                                   │
//! │  Committed ── return SaleReceipt { slip, income_entry }                 │
//! │                                                                         │
//! │  ROLLBACK itself failing → PartialCommitFailure (logged)                │
//! │  BEGIN..writes bounded by transaction_timeout → TimedOut (rolled back)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## cancel_sale
//! ```text
//! load slip ── missing ──► SaleNotFound
//!           ── cancelled ► AlreadyCancelled
//! BEGIN
//!   UPDATE slips SET status = cancelled WHERE status = paid   (0 rows ⇒ AlreadyCancelled)
//!   StockLedger::restore per line
//!   DELETE income entry WHERE slip_number = ?                 (exactly one)
//! COMMIT
//! ```
//!
//! The first statement of every unit is a write, so a unit never holds a
//! read snapshot that a concurrent commit could invalidate.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DbResult, SaleError, SaleResult};
use crate::repository::income;
use crate::repository::slip::{self as slip_store, SlipRepository};
use crate::stock::{Reservation, StockLedger};
use crate::validator::SaleValidator;
use tally_core::sale::generate_slip_number;
use tally_core::validation::{optional_text, validate_email};
use tally_core::{
    CancelReceipt, CoreError, IncomeEntry, Money, ResolvedLine, SaleReceipt, SaleRequest,
    SaleState, SaleTotals, Slip, SlipLine, SlipStatus, SoldProduct,
};

/// Everything needed to commit a sale, computed before the transaction.
#[derive(Debug, Clone)]
struct SalePlan {
    slip: Slip,
    income_entry: IncomeEntry,
    lines: Vec<ResolvedLine>,
}

impl SalePlan {
    /// (item id, quantity) pairs for reconciliation logs.
    fn movements(&self) -> Vec<(String, i64)> {
        self.lines
            .iter()
            .map(|l| (l.item_id.clone(), l.quantity))
            .collect()
    }
}

/// Orchestrates sale creation and cancellation.
#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    pool: SqlitePool,
    slips: SlipRepository,
    validator: SaleValidator,
    transaction_timeout: Duration,
}

impl SaleCoordinator {
    /// Creates a new SaleCoordinator.
    pub fn new(pool: SqlitePool, transaction_timeout: Duration) -> Self {
        SaleCoordinator {
            slips: SlipRepository::new(pool.clone()),
            validator: SaleValidator::new(StockLedger::new(pool.clone())),
            pool,
            transaction_timeout,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Validates, reserves stock, and records the slip and its income entry
    /// as one unit.
    ///
    /// ## Errors
    /// * `Rejected` - validation, unknown/ambiguous item, insufficient stock;
    ///   nothing was written
    /// * `Database` / `TimedOut` - the unit was rolled back
    /// * `PartialCommitFailure` - a rollback failed; see logs
    pub async fn create_sale(&self, request: SaleRequest) -> SaleResult<SaleReceipt> {
        let mut state = SaleState::Initiated;

        let plan = match self.plan(&request).await {
            Ok(plan) => plan,
            Err(err) => {
                state.transition(SaleState::Aborted)?;
                debug!(error = %err, "Sale rejected during validation");
                return Err(err);
            }
        };
        state.transition(SaleState::Validated)?;

        let slip_number = plan.slip.slip_number.clone();
        let staged = self
            .bounded("create_sale", &slip_number, self.stage_sale(&plan, &mut state))
            .await;
        let result = match staged {
            Ok(tx) => self.commit(tx, &slip_number).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                state.transition(SaleState::Committed)?;
                info!(
                    slip_number = %plan.slip.slip_number,
                    total_cents = plan.slip.total_cents,
                    lines = plan.lines.len(),
                    "Sale committed"
                );
                Ok(SaleReceipt {
                    slip: plan.slip,
                    income_entry: plan.income_entry,
                })
            }
            Err(err) => {
                if !state.is_terminal() {
                    state = SaleState::Aborted;
                }
                debug!(slip_number = %slip_number, state = %state, error = %err, "Sale aborted");
                Err(err)
            }
        }
    }

    /// Builds the slip and income entry from a validated request.
    async fn plan(&self, request: &SaleRequest) -> SaleResult<SalePlan> {
        let customer_name = optional_text("customerName", request.customer_name.as_deref(), 100)?;
        let customer_phone = optional_text("customerPhone", request.customer_phone.as_deref(), 30)?;
        let customer_email = optional_text("customerEmail", request.customer_email.as_deref(), 254)?;
        if let Some(email) = &customer_email {
            validate_email(email)?;
        }
        let notes = optional_text("notes", request.notes.as_deref(), 500)?;

        let lines = self.validator.validate(&request.products).await?;

        let totals = SaleTotals::from_lines(
            &lines,
            Money::from_cents(request.tax_cents.unwrap_or(0)),
            Money::from_cents(request.discount_cents.unwrap_or(0)),
        )?;

        if let Some(expected) = request.expected_total_cents.map(Money::from_cents) {
            if !totals.matches_expected(expected) {
                warn!(
                    computed_cents = totals.total.cents(),
                    expected_cents = expected.cents(),
                    "Client total differs from computed total; using computed total"
                );
            }
        }

        let now = Utc::now();
        let slip_id = Uuid::new_v4().to_string();
        let slip_number = generate_slip_number(now);

        let slip = Slip {
            id: slip_id.clone(),
            slip_number: slip_number.clone(),
            customer_name,
            customer_phone,
            customer_email,
            payment_method: request.payment_method.unwrap_or_default(),
            status: SlipStatus::Paid,
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            notes,
            created_at: now,
            cancelled_at: None,
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, line)| SlipLine::from_resolved(&slip_id, i as i64 + 1, line))
                .collect(),
        };

        let income_entry = IncomeEntry {
            id: Uuid::new_v4().to_string(),
            slip_number,
            date: now,
            total_income_cents: totals.total.cents(),
            products_sold: lines.iter().map(SoldProduct::from).collect(),
        };

        Ok(SalePlan {
            slip,
            income_entry,
            lines,
        })
    }

    /// Reserves stock and writes the slip and income entry. Returns the
    /// still-open transaction; nothing is visible until it is committed.
    async fn stage_sale(
        &self,
        plan: &SalePlan,
        state: &mut SaleState,
    ) -> SaleResult<Transaction<'static, Sqlite>> {
        let mut tx = self.pool.begin().await?;

        let mut reservations: Vec<Reservation> = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            match StockLedger::reserve(&mut tx, line).await {
                Ok(reservation) => reservations.push(reservation),
                Err(err) => {
                    state.transition(SaleState::Aborted)?;
                    let cause = match release_all(&mut tx, reservations).await {
                        Ok(()) => err.to_string(),
                        Err(release_err) => format!("{err}; release failed: {release_err}"),
                    };
                    self.abort(tx, &plan.slip.slip_number, plan.movements(), cause)
                        .await?;
                    return Err(err);
                }
            }
        }
        state.transition(SaleState::StockReserved)?;

        let writes = async {
            slip_store::insert_in(&mut tx, &plan.slip).await?;
            income::append_in(&mut tx, &plan.income_entry).await?;
            DbResult::Ok(())
        }
        .await;

        if let Err(err) = writes {
            state.transition(SaleState::Aborted)?;
            self.abort(tx, &plan.slip.slip_number, plan.movements(), err.to_string())
                .await?;
            return Err(err.into());
        }

        let reserved: Vec<(String, i64)> = reservations.into_iter().map(StockLedger::commit).collect();
        debug!(slip_number = %plan.slip.slip_number, items = ?reserved, "Sale staged");

        Ok(tx)
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Reverses a Paid sale: restores stock, removes its income entry and
    /// marks the slip Cancelled, as one unit.
    ///
    /// `reference` is the slip id or slip number.
    ///
    /// ## Errors
    /// * `SaleNotFound` - no such slip
    /// * `AlreadyCancelled` - the slip was cancelled before; nothing restored
    /// * `InvalidSaleStatus` - the slip is not Paid
    pub async fn cancel_sale(&self, reference: &str) -> SaleResult<CancelReceipt> {
        let mut slip = self
            .slips
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(reference.to_string()))?;

        match slip.status {
            SlipStatus::Paid => {}
            SlipStatus::Cancelled => {
                return Err(CoreError::AlreadyCancelled(slip.slip_number.clone()).into())
            }
            SlipStatus::Pending => {
                return Err(CoreError::InvalidSaleStatus {
                    slip_number: slip.slip_number.clone(),
                    current_status: slip.status.to_string(),
                }
                .into())
            }
        }

        let slip_number = slip.slip_number.clone();
        let now = Utc::now();
        let (tx, removed_income_id) = self
            .bounded("cancel_sale", &slip_number, self.stage_cancel(&slip, now))
            .await?;
        self.commit(tx, &slip_number).await?;

        slip.status = SlipStatus::Cancelled;
        slip.cancelled_at = Some(now);

        info!(
            slip_number = %slip.slip_number,
            total_cents = slip.total_cents,
            lines = slip.lines.len(),
            "Sale cancelled"
        );

        Ok(CancelReceipt {
            message: format!("Sale {} cancelled; stock restored", slip.slip_number),
            slip,
            removed_income_id,
        })
    }

    /// Flips the slip, restores stock and removes the income entry. Returns
    /// the open transaction and the removed income id.
    async fn stage_cancel(
        &self,
        slip: &Slip,
        at: chrono::DateTime<Utc>,
    ) -> SaleResult<(Transaction<'static, Sqlite>, String)> {
        let movements: Vec<(String, i64)> = slip
            .lines
            .iter()
            .map(|l| (l.item_id.clone(), l.quantity))
            .collect();

        let mut tx = self.pool.begin().await?;

        let flipped = match slip_store::mark_cancelled_in(&mut tx, &slip.id, at).await {
            Ok(flipped) => flipped,
            Err(err) => {
                self.abort(tx, &slip.slip_number, movements, err.to_string()).await?;
                return Err(err.into());
            }
        };
        if !flipped {
            // Lost a race with another cancellation
            self.abort(tx, &slip.slip_number, movements, "already cancelled".to_string())
                .await?;
            return Err(CoreError::AlreadyCancelled(slip.slip_number.clone()).into());
        }

        let restored = async {
            for line in &slip.lines {
                StockLedger::restore(&mut tx, &line.item_id, line.quantity).await?;
            }
            income::remove_by_slip_number_in(&mut tx, &slip.slip_number).await
        }
        .await;

        let removed_income_id = match restored {
            Ok(id) => id,
            Err(err) => {
                self.abort(tx, &slip.slip_number, movements, err.to_string()).await?;
                return Err(err.into());
            }
        };

        Ok((tx, removed_income_id))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Commits a staged unit. Runs outside the transaction timeout, so a
    /// commit that SQLite completed is never reported as timed out.
    ///
    /// A failed COMMIT leaves nothing applied: sqlx rolls the still-open
    /// transaction back when it is dropped.
    async fn commit(&self, tx: Transaction<'static, Sqlite>, slip_number: &str) -> SaleResult<()> {
        tx.commit().await.map_err(|e| {
            warn!(slip_number = %slip_number, error = %e, "Commit failed; unit rolled back");
            SaleError::from(e)
        })
    }

    /// Rolls back after a failed step.
    ///
    /// Returns `Ok(())` when the rollback succeeded (the caller then
    /// reports the original error) and `Err(PartialCommitFailure)` when it
    /// did not.
    async fn abort(
        &self,
        tx: Transaction<'static, Sqlite>,
        slip_number: &str,
        movements: Vec<(String, i64)>,
        cause: String,
    ) -> SaleResult<()> {
        debug!(slip_number = %slip_number, cause = %cause, "Rolling back unit");
        tx.rollback().await.map_err(|e| {
            escalate(
                slip_number,
                movements,
                format!("rollback failed after '{cause}': {e}"),
            )
        })
    }

    /// Bounds a unit of work by the transaction timeout.
    ///
    /// On expiry the unit's future is dropped; dropping an open sqlx
    /// transaction rolls it back.
    async fn bounded<T, F>(&self, operation: &str, slip_number: &str, unit: F) -> SaleResult<T>
    where
        F: Future<Output = SaleResult<T>>,
    {
        match tokio::time::timeout(self.transaction_timeout, unit).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = %operation,
                    slip_number = %slip_number,
                    timeout_ms = self.transaction_timeout.as_millis() as u64,
                    "Unit of work timed out; rolled back"
                );
                Err(SaleError::TimedOut {
                    operation: operation.to_string(),
                    timeout_ms: self.transaction_timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Hands reservations back, newest first.
async fn release_all(conn: &mut SqliteConnection, reservations: Vec<Reservation>) -> DbResult<()> {
    for reservation in reservations.into_iter().rev() {
        StockLedger::release(conn, reservation).await?;
    }
    Ok(())
}

/// Logs and builds a PartialCommitFailure.
fn escalate(slip_number: &str, items: Vec<(String, i64)>, details: String) -> SaleError {
    error!(
        slip_number = %slip_number,
        items = ?items,
        details = %details,
        "Partial commit failure: stock, slip and income may disagree; reconcile manually"
    );
    SaleError::PartialCommitFailure {
        slip_number: slip_number.to_string(),
        items,
        details,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};
    use tally_core::{DateRange, NewItem, PaymentMethod, SaleLine, ValidationError};

    struct Fixture {
        db: Database,
        a: String,
        b: String,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = db.items().insert(&NewItem::new("A", "Apple", 5, Some(1000))).await.unwrap();
        let b = db.items().insert(&NewItem::new("B", "Banana", 5, Some(500))).await.unwrap();
        Fixture { db, a: a.id, b: b.id }
    }

    async fn qty(db: &Database, id: &str) -> i64 {
        db.stock().quantity(id).await.unwrap()
    }

    fn two_apples_one_banana() -> SaleRequest {
        SaleRequest::new(vec![SaleLine::new("A", 2), SaleLine::new("B", 1)])
    }

    #[tokio::test]
    async fn test_create_sale_moves_stock_and_records_income() {
        let f = fixture().await;
        let mut request = two_apples_one_banana();
        request.tax_cents = Some(200);
        request.discount_cents = Some(100);
        request.payment_method = Some(PaymentMethod::Upi);
        request.customer_name = Some("  Asha ".to_string());

        let receipt = f.db.sales().create_sale(request).await.unwrap();

        assert_eq!(qty(&f.db, &f.a).await, 3);
        assert_eq!(qty(&f.db, &f.b).await, 4);

        let slip = &receipt.slip;
        assert_eq!(slip.subtotal_cents, 2500);
        assert_eq!(slip.total_cents, 2500 + 200 - 100);
        assert_eq!(slip.status, SlipStatus::Paid);
        assert_eq!(slip.payment_method, PaymentMethod::Upi);
        assert_eq!(slip.customer_name.as_deref(), Some("Asha"));
        assert_eq!(slip.lines.len(), 2);
        assert!(slip.slip_number.starts_with("SLP-"));

        assert_eq!(receipt.income_entry.slip_number, slip.slip_number);
        assert_eq!(receipt.income_entry.total_income_cents, slip.total_cents);
        assert_eq!(receipt.income_entry.products_sold.len(), 2);

        let stored = f.db.slips().find_by_id(&slip.id).await.unwrap().unwrap();
        assert_eq!(stored.lines, slip.lines);
        assert_eq!(f.db.income().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_over_request_changes_nothing() {
        let f = fixture().await;
        let request = SaleRequest::new(vec![SaleLine::new("A", 2), SaleLine::new("B", 6)]);

        let err = f.db.sales().create_sale(request).await.unwrap_err();
        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            })
        ));

        assert_eq!(qty(&f.db, &f.a).await, 5);
        assert_eq!(qty(&f.db, &f.b).await, 5);
        let slips = f.db.slips().list(&Default::default(), 1, 10).await.unwrap();
        assert_eq!(slips.total, 0);
        assert_eq!(f.db.income().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_and_bad_discount_are_rejected() {
        let f = fixture().await;

        let err = f
            .db
            .sales()
            .create_sale(SaleRequest::new(vec![SaleLine::new("Cherry", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::Rejected(CoreError::ItemNotFound(_))));

        let mut request = SaleRequest::new(vec![SaleLine::new("B", 1)]);
        request.discount_cents = Some(501);
        let err = f.db.sales().create_sale(request).await.unwrap_err();
        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::Validation(ValidationError::DiscountTooLarge { .. }))
        ));

        assert_eq!(qty(&f.db, &f.b).await, 5);
    }

    #[tokio::test]
    async fn test_expected_total_mismatch_only_warns() {
        let f = fixture().await;
        let mut request = SaleRequest::new(vec![SaleLine::new("A", 1)]);
        request.expected_total_cents = Some(1);

        let receipt = f.db.sales().create_sale(request).await.unwrap();
        assert_eq!(receipt.slip.total_cents, 1000);
    }

    #[tokio::test]
    async fn test_cancel_restores_exactly_once() {
        let f = fixture().await;
        let receipt = f.db.sales().create_sale(two_apples_one_banana()).await.unwrap();

        let cancelled = f.db.sales().cancel_sale(&receipt.slip.id).await.unwrap();
        assert_eq!(cancelled.slip.status, SlipStatus::Cancelled);
        assert!(cancelled.slip.cancelled_at.is_some());
        assert_eq!(cancelled.removed_income_id, receipt.income_entry.id);
        assert_eq!(qty(&f.db, &f.a).await, 5);
        assert_eq!(qty(&f.db, &f.b).await, 5);

        let err = f
            .db
            .sales()
            .cancel_sale(&receipt.slip.slip_number)
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::Rejected(CoreError::AlreadyCancelled(_))));
        assert_eq!(qty(&f.db, &f.a).await, 5);
        assert_eq!(qty(&f.db, &f.b).await, 5);

        let stored = f.db.slips().find_by_id(&receipt.slip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SlipStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_removes_only_its_income_entry() {
        let f = fixture().await;
        let first = f
            .db
            .sales()
            .create_sale(SaleRequest::new(vec![SaleLine::new("A", 1)]))
            .await
            .unwrap();
        let second = f
            .db
            .sales()
            .create_sale(SaleRequest::new(vec![SaleLine::new("A", 1)]))
            .await
            .unwrap();

        f.db.sales().cancel_sale(&first.slip.slip_number).await.unwrap();

        let income = f.db.income();
        assert!(income.find_by_slip_number(&first.slip.slip_number).await.unwrap().is_none());
        assert!(income.find_by_slip_number(&second.slip.slip_number).await.unwrap().is_some());
        assert_eq!(qty(&f.db, &f.a).await, 4);
    }

    #[tokio::test]
    async fn test_cancel_unknown_sale() {
        let f = fixture().await;
        let err = f.db.sales().cancel_sale("SLP-nope").await.unwrap_err();
        assert!(matches!(err, SaleError::Rejected(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_restores_to_deactivated_item_without_reactivating() {
        let f = fixture().await;
        let receipt = f
            .db
            .sales()
            .create_sale(SaleRequest::new(vec![SaleLine::new("A", 2)]))
            .await
            .unwrap();
        f.db.items().soft_delete(&f.a).await.unwrap();

        f.db.sales().cancel_sale(&receipt.slip.id).await.unwrap();

        let item = f.db.items().get_by_id(&f.a).await.unwrap().unwrap();
        assert_eq!(item.quantity, 5);
        assert!(!item.is_active);
    }

    #[tokio::test]
    async fn test_income_insert_failure_rolls_back_everything() {
        let f = fixture().await;
        sqlx::query(
            "CREATE TRIGGER fail_income BEFORE INSERT ON income_entries \
             BEGIN SELECT RAISE(ABORT, 'income ledger unavailable'); END;",
        )
        .execute(f.db.pool())
        .await
        .unwrap();

        let err = f.db.sales().create_sale(two_apples_one_banana()).await.unwrap_err();
        assert!(matches!(err, SaleError::Database(_)));

        assert_eq!(qty(&f.db, &f.a).await, 5);
        assert_eq!(qty(&f.db, &f.b).await, 5);
        assert_eq!(f.db.slips().list(&Default::default(), 1, 10).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_cancel_failure_keeps_slip_paid_and_stock_sold() {
        let f = fixture().await;
        let receipt = f.db.sales().create_sale(two_apples_one_banana()).await.unwrap();
        sqlx::query("DELETE FROM income_entries WHERE slip_number = ?1")
            .bind(&receipt.slip.slip_number)
            .execute(f.db.pool())
            .await
            .unwrap();

        // Status flip and stock restore run before the income removal fails
        let err = f.db.sales().cancel_sale(&receipt.slip.id).await.unwrap_err();
        assert!(matches!(err, SaleError::Database(DbError::NotFound { .. })));

        let stored = f.db.slips().find_by_id(&receipt.slip.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SlipStatus::Paid);
        assert!(stored.cancelled_at.is_none());
        assert_eq!(qty(&f.db, &f.a).await, 3);
        assert_eq!(qty(&f.db, &f.b).await, 4);
    }

    #[tokio::test]
    async fn test_timed_out_sale_changes_nothing() {
        let db = Database::new(DbConfig::in_memory().transaction_timeout(Duration::ZERO))
            .await
            .unwrap();
        let item = db.items().insert(&NewItem::new("A", "Apple", 5, Some(1000))).await.unwrap();

        let err = db
            .sales()
            .create_sale(SaleRequest::new(vec![SaleLine::new("A", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::TimedOut { ref operation, .. } if operation == "create_sale"));

        assert_eq!(qty(&db, &item.id).await, 5);
        assert_eq!(db.slips().list(&Default::default(), 1, 10).await.unwrap().total, 0);
        assert_eq!(db.income().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_is_a_database_error_and_changes_nothing() {
        let f = fixture().await;
        // A deferred foreign key violation only surfaces at COMMIT
        for statement in [
            "CREATE TABLE audit_parent (id TEXT PRIMARY KEY)",
            "CREATE TABLE audit_log (ref TEXT REFERENCES audit_parent (id) DEFERRABLE INITIALLY DEFERRED)",
            "CREATE TRIGGER audit_income AFTER INSERT ON income_entries \
             BEGIN INSERT INTO audit_log (ref) VALUES (NEW.slip_number); END",
        ] {
            sqlx::query(statement).execute(f.db.pool()).await.unwrap();
        }

        let err = f.db.sales().create_sale(two_apples_one_banana()).await.unwrap_err();
        assert!(matches!(err, SaleError::Database(DbError::ForeignKeyViolation { .. })));

        assert_eq!(qty(&f.db, &f.a).await, 5);
        assert_eq!(qty(&f.db, &f.b).await, 5);
        assert_eq!(f.db.slips().list(&Default::default(), 1, 10).await.unwrap().total, 0);
        assert_eq!(f.db.income().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_income_matches_paid_slips() {
        let f = fixture().await;
        let one = f.db.sales().create_sale(two_apples_one_banana()).await.unwrap();
        f.db.sales()
            .create_sale(SaleRequest::new(vec![SaleLine::new("Banana", 2)]))
            .await
            .unwrap();
        f.db.sales().cancel_sale(&one.slip.id).await.unwrap();

        let income = f.db.income().total(DateRange::all()).await.unwrap();
        let paid = f.db.slips().total_by_status(SlipStatus::Paid).await.unwrap();
        assert_eq!(income, paid);
        assert_eq!(income.cents(), 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_of_last_unit_commit_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("tally.db")).max_connections(4))
            .await
            .unwrap();
        let item = db.items().insert(&NewItem::new("LAST", "Last One", 1, Some(100))).await.unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let sales = db.sales();
                tokio::spawn(async move {
                    sales
                        .create_sale(SaleRequest::new(vec![SaleLine::new("LAST", 1)]))
                        .await
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(SaleError::Rejected(CoreError::InsufficientStock { available: 0, .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(db.stock().quantity(&item.id).await.unwrap(), 0);
        assert_eq!(db.income().count().await.unwrap(), 1);
        db.close().await;
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Sell { apples: i64, bananas: i64 },
            Cancel(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0i64..4, 0i64..4)
                    .prop_filter("at least one unit", |(a, b)| a + b > 0)
                    .prop_map(|(apples, bananas)| Op::Sell { apples, bananas }),
                (0usize..8).prop_map(Op::Cancel),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn stock_and_income_stay_consistent(ops in prop::collection::vec(op(), 1..12)) {
                let runtime = tokio::runtime::Runtime::new().unwrap();
                runtime.block_on(async {
                    let f = fixture().await;
                    let mut sold: Vec<String> = Vec::new();

                    for op in ops {
                        match op {
                            Op::Sell { apples, bananas } => {
                                let mut lines = Vec::new();
                                if apples > 0 {
                                    lines.push(SaleLine::new("A", apples));
                                }
                                if bananas > 0 {
                                    lines.push(SaleLine::new("B", bananas));
                                }
                                match f.db.sales().create_sale(SaleRequest::new(lines)).await {
                                    Ok(receipt) => sold.push(receipt.slip.id),
                                    Err(SaleError::Rejected(CoreError::InsufficientStock { .. })) => {}
                                    Err(other) => panic!("unexpected error: {other:?}"),
                                }
                            }
                            Op::Cancel(i) if !sold.is_empty() => {
                                let id = sold[i % sold.len()].clone();
                                match f.db.sales().cancel_sale(&id).await {
                                    Ok(_) | Err(SaleError::Rejected(CoreError::AlreadyCancelled(_))) => {}
                                    Err(other) => panic!("unexpected error: {other:?}"),
                                }
                            }
                            Op::Cancel(_) => {}
                        }

                        let apples = qty(&f.db, &f.a).await;
                        let bananas = qty(&f.db, &f.b).await;
                        assert!((0..=5).contains(&apples));
                        assert!((0..=5).contains(&bananas));

                        let income = f.db.income().total(DateRange::all()).await.unwrap();
                        let paid = f.db.slips().total_by_status(SlipStatus::Paid).await.unwrap();
                        assert_eq!(income, paid);
                        assert_eq!(income.cents(), (5 - apples) * 1000 + (5 - bananas) * 500);
                    }
                });
            }
        }
    }
}
