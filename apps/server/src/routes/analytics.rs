//! # Analytics Routes
//!
//! Dashboard headline numbers and sales trends. Read-only aggregates over
//! slips, items and the income ledger.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use tally_core::{Dashboard, DashboardSummary, DateRange, SalesTrends, TrendPeriod};

/// Slips listed under "recent sales".
const RECENT_SALES: u32 = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/dashboard", get(dashboard))
        .route("/api/analytics/sales-trends", get(sales_trends))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendsQuery {
    pub period: Option<String>,
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    let slips = state.db.slips();
    let today = DateRange::day_of(Utc::now());

    let low_stock = state.db.items().low_stock(state.config.low_stock_threshold).await?;

    let summary = DashboardSummary {
        total_items: state.db.items().count().await?,
        total_slips: slips.count(&DateRange::all()).await?,
        total_income_records: state.db.income().count().await?,
        total_revenue_cents: slips.revenue(&DateRange::all()).await?.cents(),
        today_slips: slips.count(&today).await?,
        today_revenue_cents: slips.revenue(&today).await?.cents(),
        low_stock_items: low_stock.len() as i64,
    };

    Ok(Json(Dashboard {
        summary,
        recent_sales: slips.recent(RECENT_SALES).await?,
        payment_methods: slips.payment_breakdown().await?,
    }))
}

async fn sales_trends(
    State(state): State<AppState>,
    query: Result<Query<TrendsQuery>, QueryRejection>,
) -> Result<Json<SalesTrends>, ApiError> {
    let Query(query) = query?;
    let period = match query.period.as_deref() {
        Some(p) => p.parse::<TrendPeriod>()?,
        None => TrendPeriod::default(),
    };
    let since = period.since(Utc::now());
    debug!(%period, %since, "Sales trends");

    let points = state.db.slips().trends(since, period.bucket_len()).await?;

    Ok(Json(SalesTrends {
        period,
        since,
        points,
    }))
}
