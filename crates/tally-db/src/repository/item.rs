//! # Item Repository
//!
//! Catalog storage for items: plain field storage, lookups and soft delete.
//! Stock movements caused by sales go through [`crate::stock::StockLedger`],
//! never through this repository.
//!
//! ## Key Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_by_id / get_by_sku / find_active_by_name   ← lookups              │
//! │  list / low_stock                               ← listings             │
//! │  insert / update / soft_delete                  ← catalog edits        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::types::{normalize_name, normalize_sku};
use tally_core::{Item, ItemPatch, NewItem};

/// Column list shared by every item query.
pub(crate) const ITEM_COLUMNS: &str = "id, sku, name, category, description, quantity, \
     price_cents, cost_cents, min_stock_level, supplier, is_active, created_at, updated_at";

/// Repository for item database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ItemRepository::new(pool);
///
/// let item = repo.insert(&NewItem::new("COLA-330", "Cola 330ml", 24, Some(150))).await?;
/// let same = repo.get_by_sku("cola-330").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an item by its ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Gets an item by SKU. The SKU is normalized before lookup.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE sku = ?1");

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(normalize_sku(sku))
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Finds active items whose name equals `name`, ignoring case
    /// (including non-ASCII letters) and surrounding whitespace.
    pub async fn find_active_by_name(&self, name: &str) -> DbResult<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE name_key = ?1 AND is_active = 1 \
             ORDER BY created_at"
        );

        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(normalize_name(name))
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists items ordered by name.
    ///
    /// ## Arguments
    /// * `search` - optional case-insensitive substring of name or SKU
    /// * `include_inactive` - include soft-deleted items
    pub async fn list(&self, search: Option<&str>, include_inactive: bool) -> DbResult<Vec<Item>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        debug!(search = ?search, include_inactive, "Listing items");

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE (?1 = 1 OR is_active = 1) \
             AND (?2 IS NULL OR instr(LOWER(name), LOWER(?2)) > 0 OR instr(sku, UPPER(?2)) > 0) \
             ORDER BY name"
        );

        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(include_inactive)
            .bind(search)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists active items at or below their low-stock level, lowest first.
    ///
    /// With `threshold`, that value replaces each item's own `min_stock_level`.
    pub async fn low_stock(&self, threshold: Option<i64>) -> DbResult<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE is_active = 1 AND quantity <= COALESCE(?1, min_stock_level) \
             ORDER BY quantity, name"
        );

        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Inserts a new item and returns it.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, new_item: &NewItem) -> DbResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            sku: normalize_sku(&new_item.sku),
            name: new_item.name.trim().to_string(),
            category: new_item.category.trim().to_string(),
            description: new_item.description.trim().to_string(),
            quantity: new_item.quantity,
            price_cents: new_item.price_cents,
            cost_cents: new_item.cost_cents,
            min_stock_level: new_item.min_stock_level,
            supplier: new_item.supplier.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %item.sku, "Inserting item");

        sqlx::query(
            r#"
            INSERT INTO items (
                id, sku, name, category, description, quantity,
                price_cents, cost_cents, min_stock_level, supplier,
                is_active, created_at, updated_at, name_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.price_cents)
        .bind(item.cost_cents)
        .bind(item.min_stock_level)
        .bind(&item.supplier)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(normalize_name(&item.name))
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: item.sku.clone(),
            },
            other => other,
        })?;

        Ok(item)
    }

    /// Applies a patch and returns the updated item.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Item doesn't exist
    pub async fn update(&self, id: &str, patch: &ItemPatch) -> DbResult<Item> {
        debug!(id = %id, "Updating item");

        let mut item = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;

        if let Some(sku) = &patch.sku {
            item.sku = normalize_sku(sku);
        }
        if let Some(name) = &patch.name {
            item.name = name.trim().to_string();
        }
        if let Some(category) = &patch.category {
            item.category = category.trim().to_string();
        }
        if let Some(description) = &patch.description {
            item.description = description.trim().to_string();
        }
        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if patch.price_cents.is_some() {
            item.price_cents = patch.price_cents;
        }
        if let Some(cost) = patch.cost_cents {
            item.cost_cents = cost;
        }
        if let Some(level) = patch.min_stock_level {
            item.min_stock_level = level;
        }
        if let Some(supplier) = &patch.supplier {
            item.supplier = supplier.trim().to_string();
        }
        if let Some(active) = patch.is_active {
            item.is_active = active;
        }
        item.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE items SET
                sku = ?2,
                name = ?3,
                category = ?4,
                description = ?5,
                quantity = ?6,
                price_cents = ?7,
                cost_cents = ?8,
                min_stock_level = ?9,
                supplier = ?10,
                is_active = ?11,
                updated_at = ?12,
                name_key = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&item.id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.price_cents)
        .bind(item.cost_cents)
        .bind(item.min_stock_level)
        .bind(&item.supplier)
        .bind(item.is_active)
        .bind(item.updated_at)
        .bind(normalize_name(&item.name))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(item)
    }

    /// Soft-deletes an item by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Slip lines still reference this item
    /// - Cancelling an old sale must still be able to restore its stock
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting item");

        let result = sqlx::query("UPDATE items SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(())
    }

    /// Counts active items (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
