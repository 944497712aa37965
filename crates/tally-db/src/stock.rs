//! # Stock Ledger
//!
//! Item resolution and the only code path that moves stock for sales.
//!
//! ## Reservation Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Inside the sale transaction:                                           │
//! │                                                                         │
//! │    reserve(line)                                                        │
//! │      UPDATE items SET quantity = quantity - :q                          │
//! │       WHERE id = :id AND quantity >= :q                                 │
//! │        │                                                                │
//! │        ├── 1 row  → Reservation { item_id, quantity }                   │
//! │        └── 0 rows → InsufficientStock (nothing changed)                 │
//! │                                                                         │
//! │    release(reservation)   quantity + :q   (same transaction)            │
//! │    commit(reservation)    units leave the ledger when the tx commits    │
//! │                                                                         │
//! │  Two concurrent sales of the last unit: SQLite serializes the writers;  │
//! │  the second UPDATE sees quantity = 0 and matches no row.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resolution Precedence
//! Exact id, then exact SKU (normalized), then case-insensitive name.
//! Several name matches is an [`CoreError::AmbiguousReference`]. Only
//! active items resolve.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, SaleError, SaleResult};
use crate::repository::item::ItemRepository;
use tally_core::sale::ResolvedLine;
use tally_core::{CoreError, Item};

/// Units taken from an item inside an open transaction.
///
/// Hand it back with [`StockLedger::release`] or finalize it with
/// [`StockLedger::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    pub item_id: String,
    pub quantity: i64,
}

/// Stock ledger: resolves references and moves quantities.
#[derive(Debug, Clone)]
pub struct StockLedger {
    items: ItemRepository,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger {
            items: ItemRepository::new(pool),
        }
    }

    /// Resolves a product reference to an active item.
    ///
    /// ## Errors
    /// * `ItemNotFound` - no active item by id, SKU or name
    /// * `AmbiguousReference` - the name matches several active items
    pub async fn resolve(&self, reference: &str) -> SaleResult<Item> {
        let reference = reference.trim();

        if let Some(item) = self.items.get_by_id(reference).await? {
            if item.is_active {
                return Ok(item);
            }
        }

        if let Some(item) = self.items.get_by_sku(reference).await? {
            if item.is_active {
                return Ok(item);
            }
        }

        let mut matches = self.items.find_active_by_name(reference).await?;
        match matches.len() {
            0 => Err(CoreError::ItemNotFound(reference.to_string()).into()),
            1 => Ok(matches.remove(0)),
            n => Err(CoreError::AmbiguousReference {
                reference: reference.to_string(),
                matches: n,
            }
            .into()),
        }
    }

    /// Takes `line.quantity` units of `line.item_id` inside the caller's
    /// transaction.
    ///
    /// ## Errors
    /// * `InsufficientStock` - fewer units on hand than requested
    /// * `ItemNotFound` - the item disappeared or was deactivated
    pub async fn reserve(conn: &mut SqliteConnection, line: &ResolvedLine) -> SaleResult<Reservation> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET quantity = quantity - ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1 AND quantity >= ?2
            "#,
        )
        .bind(&line.item_id)
        .bind(line.quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            debug!(item_id = %line.item_id, quantity = line.quantity, "Reserved stock");
            return Ok(Reservation {
                item_id: line.item_id.clone(),
                quantity: line.quantity,
            });
        }

        let available: Option<(i64, bool)> =
            sqlx::query_as("SELECT quantity, is_active FROM items WHERE id = ?1")
                .bind(&line.item_id)
                .fetch_optional(&mut *conn)
                .await?;

        match available {
            Some((available, true)) => Err(CoreError::InsufficientStock {
                product: line.name.clone(),
                available,
                requested: line.quantity,
            }
            .into()),
            _ => Err(CoreError::ItemNotFound(line.item_id.clone()).into()),
        }
    }

    /// Returns reserved units inside the same transaction.
    pub async fn release(conn: &mut SqliteConnection, reservation: Reservation) -> DbResult<()> {
        debug!(item_id = %reservation.item_id, quantity = reservation.quantity, "Releasing stock");
        Self::add(conn, &reservation.item_id, reservation.quantity).await
    }

    /// Marks a reservation as final. The units leave the ledger for good
    /// once the enclosing transaction commits.
    pub fn commit(reservation: Reservation) -> (String, i64) {
        (reservation.item_id, reservation.quantity)
    }

    /// Puts `quantity` units back on an item (cancellation).
    ///
    /// Works on inactive items and does not reactivate them.
    pub async fn restore(conn: &mut SqliteConnection, item_id: &str, quantity: i64) -> DbResult<()> {
        debug!(item_id = %item_id, quantity, "Restoring stock");
        Self::add(conn, item_id, quantity).await
    }

    async fn add(conn: &mut SqliteConnection, item_id: &str, quantity: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE items SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1")
            .bind(item_id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", item_id));
        }

        Ok(())
    }

    /// Current quantity of an item.
    pub async fn quantity(&self, item_id: &str) -> SaleResult<i64> {
        self.items
            .get_by_id(item_id)
            .await?
            .map(|item| item.quantity)
            .ok_or_else(|| SaleError::Database(DbError::not_found("Item", item_id)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use tally_core::NewItem;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_resolve_precedence() {
        let db = setup().await;
        let items = db.items();
        let a = items.insert(&NewItem::new("COLA", "Cola Zero", 5, Some(100))).await.unwrap();
        // An item whose *name* is the other item's SKU
        let b = items.insert(&NewItem::new("B-1", "cola", 5, Some(100))).await.unwrap();

        let ledger = db.stock();
        assert_eq!(ledger.resolve(&a.id).await.unwrap().id, a.id);
        // SKU wins over name
        assert_eq!(ledger.resolve("cola").await.unwrap().id, a.id);
        assert_eq!(ledger.resolve("Cola Zero").await.unwrap().id, a.id);
        assert_eq!(ledger.resolve(&b.id).await.unwrap().id, b.id);
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_and_missing() {
        let db = setup().await;
        let items = db.items();
        items.insert(&NewItem::new("W-1", "Widget", 5, None)).await.unwrap();
        items.insert(&NewItem::new("W-2", "WIDGET", 5, None)).await.unwrap();

        let err = db.stock().resolve("widget").await.unwrap_err();
        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::AmbiguousReference { matches: 2, .. })
        ));

        let err = db.stock().resolve("gadget").await.unwrap_err();
        assert!(matches!(err, SaleError::Rejected(CoreError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_non_ascii_name_ignores_case() {
        let db = setup().await;
        let items = db.items();
        let tea = items.insert(&NewItem::new("T-1", "Çay", 5, Some(100))).await.unwrap();

        let ledger = db.stock();
        assert_eq!(ledger.resolve("çay").await.unwrap().id, tea.id);
        assert_eq!(ledger.resolve(" ÇAY ").await.unwrap().id, tea.id);

        // Renames rewrite the lookup key
        let patch = tally_core::ItemPatch {
            name: Some("Éclair".to_string()),
            ..Default::default()
        };
        items.update(&tea.id, &patch).await.unwrap();
        assert_eq!(ledger.resolve("éclair").await.unwrap().id, tea.id);
        assert!(ledger.resolve("çay").await.is_err());
    }

    #[tokio::test]
    async fn test_inactive_items_do_not_resolve() {
        let db = setup().await;
        let item = db.items().insert(&NewItem::new("W-1", "Widget", 5, None)).await.unwrap();
        db.items().soft_delete(&item.id).await.unwrap();

        assert!(db.stock().resolve(&item.id).await.is_err());
        assert!(db.stock().resolve("W-1").await.is_err());
        assert!(db.stock().resolve("Widget").await.is_err());
    }

    #[tokio::test]
    async fn test_reserve_release_and_insufficient() {
        let db = setup().await;
        let item = db.items().insert(&NewItem::new("W-1", "Widget", 3, Some(100))).await.unwrap();
        let line = ResolvedLine::resolve(&item, 2, None).unwrap();
        let too_many = ResolvedLine::resolve(&item, 2, None).unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let reservation = StockLedger::reserve(&mut tx, &line).await.unwrap();

        let err = StockLedger::reserve(&mut tx, &too_many).await.unwrap_err();
        match err {
            SaleError::Rejected(CoreError::InsufficientStock {
                product,
                available,
                requested,
            }) => {
                assert_eq!(product, "Widget");
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        StockLedger::release(&mut tx, reservation).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.stock().quantity(&item.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_uncommitted_reservation_rolls_back() {
        let db = setup().await;
        let item = db.items().insert(&NewItem::new("W-1", "Widget", 3, Some(100))).await.unwrap();
        let line = ResolvedLine::resolve(&item, 3, None).unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let reservation = StockLedger::reserve(&mut tx, &line).await.unwrap();
        assert_eq!(StockLedger::commit(reservation), (item.id.clone(), 3));
        tx.rollback().await.unwrap();

        assert_eq!(db.stock().quantity(&item.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_restore_keeps_item_inactive() {
        let db = setup().await;
        let item = db.items().insert(&NewItem::new("W-1", "Widget", 0, Some(100))).await.unwrap();
        db.items().soft_delete(&item.id).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        StockLedger::restore(&mut conn, &item.id, 4).await.unwrap();
        drop(conn);

        let item = db.items().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(item.quantity, 4);
        assert!(!item.is_active);
    }
}
