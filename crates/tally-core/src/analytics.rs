//! # Sales Analytics Types
//!
//! Read-only aggregates over slips for the dashboard and trend charts.
//! Cancelled slips never count towards revenue.
//!
//! ## Trend Windows
//! ```text
//! period   window     bucket      key (from created_at)
//! ───────  ─────────  ──────────  ─────────────────────
//! week     7 days     day         2026-03-04
//! month    30 days    day         2026-03-04
//! year     365 days   month       2026-03
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{PaymentMethod, SlipStatus};

// =============================================================================
// Trend Period
// =============================================================================

/// Window for `sales-trends`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum TrendPeriod {
    #[default]
    Week,
    Month,
    Year,
}

impl TrendPeriod {
    /// Days covered, counting back from now.
    pub fn days(&self) -> i64 {
        match self {
            TrendPeriod::Week => 7,
            TrendPeriod::Month => 30,
            TrendPeriod::Year => 365,
        }
    }

    /// Length of the `created_at` prefix that names a bucket: `YYYY-MM-DD`
    /// for daily buckets, `YYYY-MM` for monthly ones.
    pub fn bucket_len(&self) -> i64 {
        match self {
            TrendPeriod::Week | TrendPeriod::Month => 10,
            TrendPeriod::Year => 7,
        }
    }

    /// Start of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Week => "week",
            TrendPeriod::Month => "month",
            TrendPeriod::Year => "year",
        }
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" => Ok(TrendPeriod::Week),
            "month" => Ok(TrendPeriod::Month),
            "year" => Ok(TrendPeriod::Year),
            _ => Err(ValidationError::NotAllowed {
                field: "period".to_string(),
                allowed: vec!["week".into(), "month".into(), "year".into()],
            }),
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Sales in one trend bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TrendPoint {
    /// `YYYY-MM-DD` or `YYYY-MM`
    pub bucket: String,
    pub total_sales_cents: i64,
    pub transactions: i64,
    /// Rounded half up to the cent.
    pub average_sale_cents: i64,
}

impl TrendPoint {
    /// Builds a point from a bucket's sum and count.
    ///
    /// ```rust
    /// use tally_core::analytics::TrendPoint;
    ///
    /// let point = TrendPoint::new("2026-03-04".to_string(), 1001, 2);
    /// assert_eq!(point.average_sale_cents, 501);
    /// ```
    pub fn new(bucket: String, total_sales_cents: i64, transactions: i64) -> Self {
        let average_sale_cents = if transactions > 0 {
            (total_sales_cents + transactions / 2) / transactions
        } else {
            0
        };

        TrendPoint {
            bucket,
            total_sales_cents,
            transactions,
            average_sale_cents,
        }
    }
}

/// Sales trend response.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalesTrends {
    pub period: TrendPeriod,
    #[ts(as = "String")]
    pub since: DateTime<Utc>,
    /// Oldest bucket first. Buckets without sales are omitted.
    pub points: Vec<TrendPoint>,
}

/// Count and revenue per payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentBreakdown {
    pub payment_method: PaymentMethod,
    pub count: i64,
    pub total_cents: i64,
}

/// A slip as shown in the dashboard's recent activity list.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecentSale {
    pub slip_number: String,
    pub customer_name: Option<String>,
    pub status: SlipStatus,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardSummary {
    /// Active catalog items.
    pub total_items: i64,
    /// Slips of every status.
    pub total_slips: i64,
    pub total_income_records: i64,
    /// Sum over slips that are not cancelled.
    pub total_revenue_cents: i64,
    /// Slips created today (UTC), any status.
    pub today_slips: i64,
    pub today_revenue_cents: i64,
    pub low_stock_items: i64,
}

/// Dashboard response.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    /// Newest first.
    pub recent_sales: Vec<RecentSale>,
    pub payment_methods: Vec<PaymentBreakdown>,
}
