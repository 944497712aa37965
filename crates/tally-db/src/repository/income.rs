//! # Income Ledger
//!
//! Append-only revenue records, one per committed slip.
//!
//! ```text
//! create_sale ──► append_in(entry { slip_number })        (same unit as the slip)
//! cancel_sale ──► remove_by_slip_number_in(slip_number)   (exactly one row)
//! reports     ──► query(range) / total(range)             (read only)
//! ```
//!
//! Entries are matched to slips by the `slip_number` back-reference, never
//! by date or amount. Writes only happen inside the coordinator's units.

use futures_util::{Stream, TryStreamExt};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{DateRange, IncomeEntry, Money};

const INCOME_COLUMNS: &str = "id, slip_number, date, total_income_cents, products_sold";

// =============================================================================
// Transaction-scoped writes
// =============================================================================

/// Appends an income entry.
pub(crate) async fn append_in(conn: &mut SqliteConnection, entry: &IncomeEntry) -> DbResult<()> {
    debug!(slip_number = %entry.slip_number, total = entry.total_income_cents, "Appending income entry");

    sqlx::query(
        r#"
        INSERT INTO income_entries (id, slip_number, date, total_income_cents, products_sold)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.slip_number)
    .bind(entry.date)
    .bind(entry.total_income_cents)
    .bind(Json(&entry.products_sold))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Removes the entry for `slip_number` and returns its id.
///
/// ## Returns
/// * `Err(DbError::NotFound)` - no entry references the slip
pub(crate) async fn remove_by_slip_number_in(
    conn: &mut SqliteConnection,
    slip_number: &str,
) -> DbResult<String> {
    let removed: Option<String> =
        sqlx::query_scalar("DELETE FROM income_entries WHERE slip_number = ?1 RETURNING id")
            .bind(slip_number)
            .fetch_optional(&mut *conn)
            .await?;

    removed.ok_or_else(|| DbError::not_found("Income entry for slip", slip_number))
}

// =============================================================================
// Ledger
// =============================================================================

/// Read side of the income ledger.
#[derive(Debug, Clone)]
pub struct IncomeLedger {
    pool: SqlitePool,
}

impl IncomeLedger {
    /// Creates a new IncomeLedger.
    pub fn new(pool: SqlitePool) -> Self {
        IncomeLedger { pool }
    }

    /// Streams entries in `range`, newest first.
    ///
    /// Rows are decoded as they are pulled; nothing is buffered up front.
    ///
    /// ## Example
    /// ```rust,ignore
    /// use futures_util::TryStreamExt;
    ///
    /// let entries: Vec<IncomeEntry> = db.income().query(DateRange::all()).try_collect().await?;
    /// ```
    pub fn query(&self, range: DateRange) -> impl Stream<Item = DbResult<IncomeEntry>> + Send + '_ {
        debug!(?range, "Streaming income entries");

        sqlx::query_as::<_, IncomeEntry>(
            "SELECT id, slip_number, date, total_income_cents, products_sold \
             FROM income_entries \
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date < ?2) \
             ORDER BY date DESC, id DESC",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch(&self.pool)
        .map_err(DbError::from)
    }

    /// Collects [`IncomeLedger::query`] into a Vec.
    pub async fn list(&self, range: DateRange) -> DbResult<Vec<IncomeEntry>> {
        self.query(range).try_collect().await
    }

    /// Sum of entry totals in `range`.
    pub async fn total(&self, range: DateRange) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_income_cents), 0) FROM income_entries \
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date < ?2)",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Gets the entry created for `slip_number`.
    pub async fn find_by_slip_number(&self, slip_number: &str) -> DbResult<Option<IncomeEntry>> {
        let sql = format!("SELECT {INCOME_COLUMNS} FROM income_entries WHERE slip_number = ?1");

        let entry = sqlx::query_as::<_, IncomeEntry>(&sql)
            .bind(slip_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Number of entries (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM income_entries")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{DateTime, Duration, Utc};
    use tally_core::{PaymentMethod, Slip, SlipStatus, SoldProduct};

    async fn seed_slip(db: &Database, number: &str, total: i64, at: DateTime<Utc>) -> IncomeEntry {
        let slip = Slip {
            id: uuid::Uuid::new_v4().to_string(),
            slip_number: number.to_string(),
            customer_name: None,
            customer_phone: None,
            customer_email: None,
            payment_method: PaymentMethod::Cash,
            status: SlipStatus::Paid,
            subtotal_cents: total,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: total,
            notes: None,
            created_at: at,
            cancelled_at: None,
            lines: vec![],
        };
        let entry = IncomeEntry {
            id: uuid::Uuid::new_v4().to_string(),
            slip_number: number.to_string(),
            date: at,
            total_income_cents: total,
            products_sold: vec![SoldProduct {
                product_name: "Widget".to_string(),
                sku: "A-1".to_string(),
                quantity: 1,
                unit_price_cents: total,
                total_price_cents: total,
            }],
        };

        let mut tx = db.pool().begin().await.unwrap();
        crate::repository::slip::insert_in(&mut tx, &slip).await.unwrap();
        append_in(&mut tx, &entry).await.unwrap();
        tx.commit().await.unwrap();
        entry
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_and_filters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        seed_slip(&db, "SLP-1", 100, now - Duration::days(3)).await;
        seed_slip(&db, "SLP-2", 200, now - Duration::days(1)).await;
        seed_slip(&db, "SLP-3", 300, now).await;

        let ledger = db.income();
        let all = ledger.list(DateRange::all()).await.unwrap();
        let numbers: Vec<&str> = all.iter().map(|e| e.slip_number.as_str()).collect();
        assert_eq!(numbers, vec!["SLP-3", "SLP-2", "SLP-1"]);
        assert_eq!(all[0].products_sold.len(), 1);
        assert_eq!(all[0].products_sold[0].sku, "A-1");

        let recent = DateRange::new(Some(now - Duration::days(2)), None);
        assert_eq!(ledger.list(recent).await.unwrap().len(), 2);
        assert_eq!(ledger.total(recent).await.unwrap().cents(), 500);
        assert_eq!(ledger.total(DateRange::all()).await.unwrap().cents(), 600);
    }

    #[tokio::test]
    async fn test_remove_by_slip_number_removes_only_that_entry() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let first = seed_slip(&db, "SLP-1", 100, now).await;
        seed_slip(&db, "SLP-2", 100, now).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let removed = remove_by_slip_number_in(&mut conn, "SLP-1").await.unwrap();
        assert_eq!(removed, first.id);
        let again = remove_by_slip_number_in(&mut conn, "SLP-1").await.unwrap_err();
        assert!(matches!(again, DbError::NotFound { .. }));
        drop(conn);

        let ledger = db.income();
        assert_eq!(ledger.count().await.unwrap(), 1);
        assert!(ledger.find_by_slip_number("SLP-1").await.unwrap().is_none());
        assert!(ledger.find_by_slip_number("SLP-2").await.unwrap().is_some());
    }
}
