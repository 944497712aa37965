//! # Slip Repository
//!
//! Durable sale records ("slips") and their lines.
//!
//! ## Slip Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Slip Lifecycle                                    │
//! │                                                                         │
//! │  1. COMMIT (SaleCoordinator::create_sale, inside the sale unit)        │
//! │     └── insert_in() → Slip { status: Paid } + slip_lines               │
//! │                                                                         │
//! │  2. (OPTIONAL) CANCEL (SaleCoordinator::cancel_sale, inside the unit)  │
//! │     └── mark_cancelled_in() → Slip { status: Cancelled, cancelled_at } │
//! │                                                                         │
//! │  3. (OPTIONAL) PURGE, Cancelled slips only                             │
//! │     └── delete() → slip + lines removed                                │
//! │                                                                         │
//! │  Read side: find_by_id, find_by_slip_number, list(filter, page)        │
//! │  Aggregates: count, revenue, recent, payment_breakdown, trends         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions ending in `_in` take a connection so they can run inside the
//! caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::validation::is_uuid;
use tally_core::{
    DateRange, Money, Page, PaymentBreakdown, RecentSale, Slip, SlipFilter, SlipLine, SlipStatus,
    TrendPoint,
};

const SLIP_COLUMNS: &str = "id, slip_number, customer_name, customer_phone, customer_email, \
     payment_method, status, subtotal_cents, tax_cents, discount_cents, total_cents, notes, \
     created_at, cancelled_at";

const LINE_COLUMNS: &str = "slip_id, line_no, item_id, sku_snapshot, name_snapshot, quantity, \
     unit_price_cents, line_total_cents, price_source";

// =============================================================================
// Transaction-scoped writes
// =============================================================================

/// Inserts a slip and all of its lines.
pub(crate) async fn insert_in(conn: &mut SqliteConnection, slip: &Slip) -> DbResult<()> {
    debug!(id = %slip.id, slip_number = %slip.slip_number, "Inserting slip");

    sqlx::query(
        r#"
        INSERT INTO slips (
            id, slip_number, customer_name, customer_phone, customer_email,
            payment_method, status, subtotal_cents, tax_cents, discount_cents,
            total_cents, notes, created_at, cancelled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&slip.id)
    .bind(&slip.slip_number)
    .bind(&slip.customer_name)
    .bind(&slip.customer_phone)
    .bind(&slip.customer_email)
    .bind(slip.payment_method)
    .bind(slip.status)
    .bind(slip.subtotal_cents)
    .bind(slip.tax_cents)
    .bind(slip.discount_cents)
    .bind(slip.total_cents)
    .bind(&slip.notes)
    .bind(slip.created_at)
    .bind(slip.cancelled_at)
    .execute(&mut *conn)
    .await?;

    for line in &slip.lines {
        sqlx::query(
            r#"
            INSERT INTO slip_lines (
                slip_id, line_no, item_id, sku_snapshot, name_snapshot,
                quantity, unit_price_cents, line_total_cents, price_source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.slip_id)
        .bind(line.line_no)
        .bind(&line.item_id)
        .bind(&line.sku_snapshot)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .bind(line.price_source)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Flips a Paid slip to Cancelled.
///
/// ## Returns
/// * `Ok(true)` - this call cancelled the slip
/// * `Ok(false)` - the slip was not Paid (already cancelled, or missing)
pub(crate) async fn mark_cancelled_in(
    conn: &mut SqliteConnection,
    id: &str,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE slips SET status = ?3, cancelled_at = ?2 WHERE id = ?1 AND status = ?4",
    )
    .bind(id)
    .bind(at)
    .bind(SlipStatus::Cancelled)
    .bind(SlipStatus::Paid)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for slip database operations.
#[derive(Debug, Clone)]
pub struct SlipRepository {
    pool: SqlitePool,
}

impl SlipRepository {
    /// Creates a new SlipRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SlipRepository { pool }
    }

    /// Persists a slip and its lines in one transaction.
    ///
    /// Sales go through the coordinator, which writes the slip together
    /// with stock and income; this is the standalone form.
    pub async fn save(&self, slip: &Slip) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_in(&mut tx, slip).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Gets a slip (with lines) by its ID.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Slip>> {
        let sql = format!("SELECT {SLIP_COLUMNS} FROM slips WHERE id = ?1");

        let slip = sqlx::query_as::<_, Slip>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        self.with_lines(slip).await
    }

    /// Gets a slip (with lines) by its slip number.
    pub async fn find_by_slip_number(&self, slip_number: &str) -> DbResult<Option<Slip>> {
        let sql = format!("SELECT {SLIP_COLUMNS} FROM slips WHERE slip_number = ?1");

        let slip = sqlx::query_as::<_, Slip>(&sql)
            .bind(slip_number.trim())
            .fetch_optional(&self.pool)
            .await?;

        self.with_lines(slip).await
    }

    /// Gets a slip by id when `reference` looks like a UUID, otherwise by
    /// slip number.
    pub async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Slip>> {
        let reference = reference.trim();
        if is_uuid(reference) {
            if let Some(slip) = self.find_by_id(reference).await? {
                return Ok(Some(slip));
            }
        }
        self.find_by_slip_number(reference).await
    }

    /// Lists slips newest first.
    ///
    /// ## Arguments
    /// * `filter` - date range, status, payment method, customer substring
    /// * `page` - 1-based page number
    /// * `limit` - page size
    pub async fn list(&self, filter: &SlipFilter, page: u32, limit: u32) -> DbResult<Page<Slip>> {
        debug!(?filter, page, limit, "Listing slips");

        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM slips");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SLIP_COLUMNS} FROM slips"));
        push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC, slip_number DESC LIMIT ");
        query.push_bind(i64::from(limit));
        query.push(" OFFSET ");
        query.push_bind(offset);

        let slips = query.build_query_as::<Slip>().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(slips.len());
        for mut slip in slips {
            slip.lines = self.lines(&slip.id).await?;
            items.push(slip);
        }

        Ok(Page {
            items,
            page,
            limit,
            total,
        })
    }

    /// Sum of totals over slips with `status`.
    pub async fn total_by_status(&self, status: SlipStatus) -> DbResult<Money> {
        let cents: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_cents), 0) FROM slips WHERE status = ?1")
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

        Ok(Money::from_cents(cents))
    }

    /// Purges a cancelled slip and its lines.
    ///
    /// Not a reversal path: a Paid slip still owns sold stock and an income
    /// entry, so it is refused. Reversal is `SaleCoordinator::cancel_sale`.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such slip
    /// * `Err(DbError::InvalidState)` - the slip is not Cancelled
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting slip");

        let result = sqlx::query("DELETE FROM slips WHERE id = ?1 AND status = ?2")
            .bind(id)
            .bind(SlipStatus::Cancelled)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let status: Option<SlipStatus> = sqlx::query_scalar("SELECT status FROM slips WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match status {
            None => Err(DbError::not_found("Slip", id)),
            Some(status) => Err(DbError::InvalidState {
                entity: "Slip".to_string(),
                id: id.to_string(),
                reason: format!("is {status}; only cancelled slips can be deleted"),
            }),
        }
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Number of slips created in `range`, any status.
    pub async fn count(&self, range: &DateRange) -> DbResult<i64> {
        let filter = SlipFilter {
            range: *range,
            ..Default::default()
        };
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM slips");
        push_filters(&mut query, &filter);

        let count = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Sum of totals over slips created in `range` that are not cancelled.
    pub async fn revenue(&self, range: &DateRange) -> DbResult<Money> {
        let filter = SlipFilter {
            range: *range,
            ..Default::default()
        };
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COALESCE(SUM(total_cents), 0) FROM slips");
        let mut first = push_filters(&mut query, &filter);
        push_clause(&mut query, &mut first);
        query.push("status <> ").push_bind(SlipStatus::Cancelled);

        let cents = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(Money::from_cents(cents))
    }

    /// The `limit` newest slips, any status.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<RecentSale>> {
        let sales = sqlx::query_as::<_, RecentSale>(
            r#"
            SELECT slip_number, customer_name, status, total_cents, created_at
            FROM slips
            ORDER BY created_at DESC, slip_number DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Count and revenue per payment method over slips that are not
    /// cancelled, largest revenue first.
    pub async fn payment_breakdown(&self) -> DbResult<Vec<PaymentBreakdown>> {
        let rows = sqlx::query_as::<_, PaymentBreakdown>(
            r#"
            SELECT payment_method, COUNT(*) AS count, COALESCE(SUM(total_cents), 0) AS total_cents
            FROM slips
            WHERE status <> ?1
            GROUP BY payment_method
            ORDER BY total_cents DESC, payment_method
            "#,
        )
        .bind(SlipStatus::Cancelled)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Non-cancelled sales since `since`, bucketed by the first
    /// `bucket_len` characters of `created_at` (10 = day, 7 = month).
    /// Oldest bucket first; empty buckets are absent.
    pub async fn trends(&self, since: DateTime<Utc>, bucket_len: i64) -> DbResult<Vec<TrendPoint>> {
        debug!(%since, bucket_len, "Aggregating sales trends");

        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT substr(created_at, 1, ?1) AS bucket,
                   COALESCE(SUM(total_cents), 0),
                   COUNT(*)
            FROM slips
            WHERE created_at >= ?2 AND status <> ?3
            GROUP BY bucket
            ORDER BY bucket
            "#,
        )
        .bind(bucket_len)
        .bind(since)
        .bind(SlipStatus::Cancelled)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(bucket, total, count)| TrendPoint::new(bucket, total, count))
            .collect())
    }

    async fn with_lines(&self, slip: Option<Slip>) -> DbResult<Option<Slip>> {
        match slip {
            Some(mut slip) => {
                slip.lines = self.lines(&slip.id).await?;
                Ok(Some(slip))
            }
            None => Ok(None),
        }
    }

    async fn lines(&self, slip_id: &str) -> DbResult<Vec<SlipLine>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM slip_lines WHERE slip_id = ?1 ORDER BY line_no");

        let lines = sqlx::query_as::<_, SlipLine>(&sql)
            .bind(slip_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }
}

/// Appends `WHERE ...` for the set filters. Returns `true` while no clause
/// has been pushed yet.
fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &SlipFilter) -> bool {
    let mut first = true;

    if let Some(start) = filter.range.start {
        push_clause(query, &mut first);
        query.push("created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.range.end {
        push_clause(query, &mut first);
        query.push("created_at < ").push_bind(end);
    }
    if let Some(status) = filter.status {
        push_clause(query, &mut first);
        query.push("status = ").push_bind(status);
    }
    if let Some(method) = filter.payment_method {
        push_clause(query, &mut first);
        query.push("payment_method = ").push_bind(method);
    }
    if let Some(customer) = filter.customer.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        push_clause(query, &mut first);
        query
            .push("instr(LOWER(COALESCE(customer_name, '')), LOWER(")
            .push_bind(customer.to_string())
            .push(")) > 0");
    }

    first
}

fn push_clause(query: &mut QueryBuilder<'_, Sqlite>, first: &mut bool) {
    query.push(if *first { " WHERE " } else { " AND " });
    *first = false;
}

// =============================================================================
// Unit Tests
// =============================================================================
