//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │      Slip       │   │   IncomeEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (unique)   │◄──│  lines[]        │   │  slip_number ───┼──► Slip│
//! │  │  quantity ≥ 0   │   │  slip_number    │   │  products_sold  │       │
//! │  │  price_cents    │   │  status         │   │  total_income   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   SlipStatus    │   │ PaymentMethod   │                             │
//! │  │  Pending        │   │  Cash  Card     │                             │
//! │  │  Paid           │   │  UPI   BankTr.  │                             │
//! │  │  Cancelled      │   │  Credit Other   │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Items carry a UUID `id` for relations and a business `sku`. Slips carry
//! a UUID `id` and a human-readable `slip_number`; the income ledger refers
//! to slips by `slip_number`.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::sale::{PriceSource, ResolvedLine};
use crate::DEFAULT_MIN_STOCK_LEVEL;

// =============================================================================
// Item
// =============================================================================

/// A catalog-tracked inventory unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Item {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit, stored upper-cased and trimmed.
    pub sku: String,

    pub name: String,

    pub category: String,

    pub description: String,

    /// Units on hand. Never negative.
    pub quantity: i64,

    /// Catalog unit price in cents. `None` when the catalog has no price.
    pub price_cents: Option<i64>,

    /// Purchase cost in cents (for margin reporting).
    pub cost_cents: i64,

    /// At or below this quantity the item counts as low stock.
    pub min_stock_level: i64,

    pub supplier: String,

    /// Soft-delete flag. Inactive items cannot be sold.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the catalog price as Money, if set.
    #[inline]
    pub fn price(&self) -> Option<Money> {
        self.price_cents.map(Money::from_cents)
    }

    /// True when `quantity` units can be taken from stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && quantity > 0 && self.quantity >= quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    /// Unit margin, when the item has a catalog price.
    pub fn profit(&self) -> Option<Money> {
        self.price()
            .map(|price| price - Money::from_cents(self.cost_cents))
    }
}

/// Normalizes a SKU for storage and lookup.
///
/// ```rust
/// assert_eq!(tally_core::types::normalize_sku("  cola-330 "), "COLA-330");
/// ```
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_uppercase()
}

/// Lookup key for case-insensitive name matching. Full Unicode lower-casing,
/// unlike SQLite's ASCII-only `LOWER()`.
///
/// ```rust
/// assert_eq!(tally_core::types::normalize_name(" Çay Bardağı "), "çay bardağı");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Fields for creating a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub cost_cents: i64,
    #[serde(default = "default_min_stock_level")]
    pub min_stock_level: i64,
    #[serde(default)]
    pub supplier: String,
}

fn default_category() -> String {
    "General".to_string()
}

fn default_min_stock_level() -> i64 {
    DEFAULT_MIN_STOCK_LEVEL
}

impl NewItem {
    /// Minimal item with defaults for everything but SKU, name, stock and price.
    pub fn new(sku: &str, name: &str, quantity: i64, price_cents: Option<i64>) -> Self {
        NewItem {
            sku: sku.to_string(),
            name: name.to_string(),
            category: default_category(),
            description: String::new(),
            quantity,
            price_cents,
            cost_cents: 0,
            min_stock_level: DEFAULT_MIN_STOCK_LEVEL,
            supplier: String::new(),
        }
    }
}

/// Partial update of catalog fields. Quantity is included for manual
/// stock corrections; sales never go through this path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub price_cents: Option<i64>,
    pub cost_cents: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub supplier: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Slip Status
// =============================================================================

/// The status of a recorded sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum SlipStatus {
    /// Recorded but not yet paid.
    Pending,
    /// Paid and committed. The only status the coordinator writes.
    #[default]
    Paid,
    /// Reversed; stock restored and income entry removed.
    Cancelled,
}

impl SlipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlipStatus::Pending => "pending",
            SlipStatus::Paid => "paid",
            SlipStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SlipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlipStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SlipStatus::Pending),
            "paid" => Ok(SlipStatus::Paid),
            "cancelled" | "canceled" => Ok(SlipStatus::Cancelled),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec!["Pending".into(), "Paid".into(), "Cancelled".into()],
            }),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    #[serde(rename = "UPI", alias = "Upi")]
    Upi,
    #[serde(rename = "Bank Transfer", alias = "BankTransfer")]
    BankTransfer,
    Credit,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "banktransfer" => Ok(PaymentMethod::BankTransfer),
            "credit" => Ok(PaymentMethod::Credit),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(ValidationError::NotAllowed {
                field: "paymentMethod".to_string(),
                allowed: vec![
                    "Cash".into(),
                    "Card".into(),
                    "UPI".into(),
                    "Bank Transfer".into(),
                    "Credit".into(),
                    "Other".into(),
                ],
            }),
        }
    }
}

// =============================================================================
// Slip
// =============================================================================

/// A recorded sale document.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Slip {
    pub id: String,
    /// Human-readable, globally unique, time-ordered.
    pub slip_number: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: SlipStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    /// subtotal + tax - discount
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Loaded from `slip_lines`, in line order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<SlipLine>,
}

impl Slip {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == SlipStatus::Cancelled
    }

    /// Sum of line quantities.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// One line of a slip. Item details are snapshotted at sale time so the
/// slip reads the same after catalog edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SlipLine {
    pub slip_id: String,
    pub line_no: i64,
    pub item_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub price_source: PriceSource,
}

impl SlipLine {
    /// Builds a persisted line from a resolved sale line.
    pub fn from_resolved(slip_id: &str, line_no: i64, line: &ResolvedLine) -> Self {
        SlipLine {
            slip_id: slip_id.to_string(),
            line_no,
            item_id: line.item_id.clone(),
            sku_snapshot: line.sku.clone(),
            name_snapshot: line.name.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            line_total_cents: line.line_total.cents(),
            price_source: line.price_source,
        }
    }
}

// =============================================================================
// Income Entry
// =============================================================================

/// A revenue record tied to exactly one committed slip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct IncomeEntry {
    pub id: String,
    /// Back-reference to the originating slip.
    pub slip_number: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub total_income_cents: i64,
    /// Stored as a JSON array.
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub products_sold: Vec<SoldProduct>,
}

impl IncomeEntry {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_income_cents)
    }
}

/// One product line of an income entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SoldProduct {
    pub product_name: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
}

impl From<&ResolvedLine> for SoldProduct {
    fn from(line: &ResolvedLine) -> Self {
        SoldProduct {
            product_name: line.name.clone(),
            sku: line.sku.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            total_price_cents: line.line_total.cents(),
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Half-open time range `[start, end)`. Missing bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        DateRange { start, end }
    }

    /// Everything.
    pub fn all() -> Self {
        DateRange::default()
    }

    /// The UTC calendar day containing `now`.
    pub fn day_of(now: DateTime<Utc>) -> Self {
        let start = start_of_day(now);
        DateRange::new(Some(start), Some(start + Duration::days(1)))
    }

    /// The last `days` calendar days including today.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        let end = start_of_day(now) + Duration::days(1);
        DateRange::new(Some(end - Duration::days(days.max(1))), Some(end))
    }

    /// The calendar month containing `now`.
    pub fn month_of(now: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single();
        let (next_year, next_month) = if now.month() == 12 {
            (now.year() + 1, 1)
        } else {
            (now.year(), now.month() + 1)
        };
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single();
        DateRange::new(start, end)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at < e)
    }

    /// Rejects ranges whose end is before their start.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if end < start => Err(ValidationError::InvalidFormat {
                field: "endDate".to_string(),
                reason: "must not be before startDate".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// Filters for listing slips.
#[derive(Debug, Clone, Default)]
pub struct SlipFilter {
    pub range: DateRange,
    pub status: Option<SlipStatus>,
    pub payment_method: Option<PaymentMethod>,
    /// Case-insensitive substring of the customer name.
    pub customer: Option<String>,
}

/// A page of results.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            return 0;
        }
        (self.total + self.limit as i64 - 1) / self.limit as i64
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, active: bool) -> Item {
        let now = Utc::now();
        Item {
            id: "id-1".to_string(),
            sku: "COLA-330".to_string(),
            name: "Cola 330ml".to_string(),
            category: "General".to_string(),
            description: String::new(),
            quantity,
            price_cents: Some(150),
            cost_cents: 90,
            min_stock_level: 10,
            supplier: String::new(),
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_item_stock_checks() {
        assert!(item(5, true).can_sell(5));
        assert!(!item(5, true).can_sell(6));
        assert!(!item(5, false).can_sell(1));
        assert!(!item(5, true).can_sell(0));

        assert!(item(10, true).is_low_stock());
        assert!(!item(11, true).is_low_stock());
        assert!(item(0, true).is_out_of_stock());
        assert_eq!(item(1, true).profit(), Some(Money::from_cents(60)));
    }

    #[test]
    fn test_normalize_sku_and_name() {
        assert_eq!(normalize_sku(" abc-1 "), "ABC-1");
        assert_eq!(normalize_name("  ÉCLAIR "), "éclair");
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("UPI".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert_eq!(
            "Bank Transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert_eq!(
            "bank_transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_json_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"Bank Transfer\""
        );
        assert_eq!(serde_json::to_string(&PaymentMethod::Upi).unwrap(), "\"UPI\"");
        let parsed: PaymentMethod = serde_json::from_str("\"BankTransfer\"").unwrap();
        assert_eq!(parsed, PaymentMethod::BankTransfer);
    }

    #[test]
    fn test_slip_status() {
        assert_eq!(SlipStatus::default(), SlipStatus::Paid);
        assert_eq!("Cancelled".parse::<SlipStatus>().unwrap(), SlipStatus::Cancelled);
        assert!("refunded".parse::<SlipStatus>().is_err());
        assert_eq!(serde_json::to_string(&SlipStatus::Paid).unwrap(), "\"Paid\"");
    }

    #[test]
    fn test_date_ranges() {
        let now = Utc.with_ymd_and_hms(2026, 12, 15, 13, 30, 0).unwrap();

        let today = DateRange::day_of(now);
        assert!(today.contains(now));
        assert!(!today.contains(now + Duration::days(1)));

        let week = DateRange::last_days(now, 7);
        assert!(week.contains(Utc.with_ymd_and_hms(2026, 12, 9, 0, 0, 0).unwrap()));
        assert!(!week.contains(Utc.with_ymd_and_hms(2026, 12, 8, 23, 59, 59).unwrap()));

        let month = DateRange::month_of(now);
        assert_eq!(month.start, Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).single());
        assert_eq!(month.end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).single());

        let backwards = DateRange::new(month.end, month.start);
        assert!(backwards.validate().is_err());
        assert!(DateRange::all().validate().is_ok());
    }

    #[test]
    fn test_page_count() {
        let page: Page<i32> = Page {
            items: vec![],
            page: 1,
            limit: 20,
            total: 41,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
